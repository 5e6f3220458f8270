//! In-memory identity service for tests/dev.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tenantgate_core::{IdentityId, OrganizationId};

use crate::{
    AuthError, AuthSession, Credentials, DeveloperRecord, Identity, IdentityService, LookupError,
    LookupResult, Membership, OrgRoleKind, Organization, OrganizationRole, Provisioning,
    ServiceError,
};

/// Operations of the identity service contract, for failure injection and call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    FindDeveloper,
    FindOrgMembership,
    RestoreSession,
    SignIn,
    SignOut,
}

/// One recorded call against the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub identity: Option<IdentityId>,
}

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    developers: HashSet<IdentityId>,
    memberships: HashMap<IdentityId, Membership>,
    organizations: HashMap<OrganizationId, Organization>,
    accounts: HashMap<String, Account>,
    session: Option<AuthSession>,
    failures: HashMap<Operation, ServiceError>,
    calls: Vec<Call>,
}

/// Seed data for [`InMemoryIdentityService`], usually loaded from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityFixture {
    #[serde(default)]
    pub developers: Vec<IdentityId>,
    #[serde(default)]
    pub organizations: Vec<OrganizationFixture>,
    #[serde(default)]
    pub memberships: Vec<MembershipFixture>,
    #[serde(default)]
    pub accounts: Vec<AccountFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationFixture {
    pub id: OrganizationId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipFixture {
    pub user_id: IdentityId,
    pub organization_id: OrganizationId,
    pub role: OrgRoleKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountFixture {
    pub email: String,
    pub password: String,
    pub user_id: IdentityId,
}

/// In-memory implementation of [`IdentityService`] and [`Provisioning`].
///
/// - Lookups that match nothing answer with the backend's no-row sentinel
/// - Failures can be injected per operation and stay until cleared
/// - Every contract call is recorded in order
#[derive(Debug)]
pub struct InMemoryIdentityService {
    state: RwLock<State>,
    session_ttl: Duration,
}

impl Default for InMemoryIdentityService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            session_ttl: Duration::hours(1),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn from_fixture(fixture: IdentityFixture) -> Self {
        let service = Self::new();
        let now = Utc::now();

        if let Ok(mut state) = service.state.write() {
            for org in fixture.organizations {
                state.organizations.insert(
                    org.id.clone(),
                    Organization {
                        id: org.id,
                        name: org.name,
                        created_at: now,
                    },
                );
            }
            state.developers.extend(fixture.developers);
            for m in fixture.memberships {
                state.memberships.insert(
                    m.user_id.clone(),
                    Membership {
                        organization_id: m.organization_id,
                        user_id: m.user_id,
                        role: m.role,
                        created_at: now,
                    },
                );
            }
            for a in fixture.accounts {
                state.accounts.insert(
                    a.email.to_lowercase(),
                    Account {
                        identity: Identity::new(a.user_id).with_email(a.email),
                        password: a.password,
                    },
                );
            }
        }

        service
    }

    pub fn add_developer(&self, identity: IdentityId) {
        if let Ok(mut state) = self.state.write() {
            state.developers.insert(identity);
        }
    }

    /// Seed a membership directly, bypassing the organization existence check.
    pub fn set_membership(&self, identity: IdentityId, role: OrganizationRole) {
        if let Ok(mut state) = self.state.write() {
            let membership = Membership {
                organization_id: role.organization_id,
                user_id: identity.clone(),
                role: role.role,
                created_at: Utc::now(),
            };
            state.memberships.insert(identity, membership);
        }
    }

    pub fn add_account(&self, email: &str, password: &str, identity: IdentityId) {
        if let Ok(mut state) = self.state.write() {
            state.accounts.insert(
                email.to_lowercase(),
                Account {
                    identity: Identity::new(identity).with_email(email),
                    password: password.to_string(),
                },
            );
        }
    }

    /// Make `session` available to the next restore check.
    pub fn store_session(&self, session: AuthSession) {
        if let Ok(mut state) = self.state.write() {
            state.session = Some(session);
        }
    }

    pub fn current_session(&self) -> Option<AuthSession> {
        self.state.read().ok().and_then(|s| s.session.clone())
    }

    /// Make every subsequent `operation` fail with `error` until cleared.
    pub fn fail(&self, operation: Operation, error: ServiceError) {
        if let Ok(mut state) = self.state.write() {
            state.failures.insert(operation, error);
        }
    }

    pub fn clear_failure(&self, operation: Operation) {
        if let Ok(mut state) = self.state.write() {
            state.failures.remove(&operation);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.read().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.calls().into_iter().map(|c| c.operation).collect()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, ServiceError> {
        self.state.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, ServiceError> {
        self.state.write().map_err(|_| poisoned())
    }

    /// Record the call, then fail if a failure is injected for it.
    fn begin(&self, operation: Operation, identity: Option<&IdentityId>) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        state.calls.push(Call {
            operation,
            identity: identity.cloned(),
        });
        match state.failures.get(&operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn poisoned() -> ServiceError {
    ServiceError::new("internal", "identity state lock poisoned")
}

#[async_trait::async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn find_developer(&self, identity: &IdentityId) -> LookupResult<DeveloperRecord> {
        self.begin(Operation::FindDeveloper, Some(identity))?;
        let state = self.read()?;
        if state.developers.contains(identity) {
            Ok(DeveloperRecord {
                user_id: identity.clone(),
            })
        } else {
            Err(LookupError::NotFound)
        }
    }

    async fn find_org_membership(&self, identity: &IdentityId) -> LookupResult<OrganizationRole> {
        self.begin(Operation::FindOrgMembership, Some(identity))?;
        let state = self.read()?;
        state
            .memberships
            .get(identity)
            .map(Membership::organization_role)
            .ok_or(LookupError::NotFound)
    }

    async fn restored_session(&self) -> Result<Option<AuthSession>, AuthError> {
        self.begin(Operation::RestoreSession, None)?;
        Ok(self.read()?.session.clone())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
        self.begin(Operation::SignIn, None)?;
        let mut state = self.write()?;
        let account = state
            .accounts
            .get(&credentials.email.to_lowercase())
            .filter(|a| a.password == credentials.password)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;

        let session = AuthSession::issue(account.identity, Utc::now(), self.session_ttl);
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.begin(Operation::SignOut, None)?;
        self.write()?.session = None;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Provisioning for InMemoryIdentityService {
    async fn create_organization(&self, name: &str) -> Result<Organization, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::new("23514", "organization name must not be empty"));
        }
        let id = OrganizationId::parse(Uuid::now_v7().to_string())
            .map_err(|e| ServiceError::new("internal", e.to_string()))?;
        let org = Organization {
            id: id.clone(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.write()?.organizations.insert(id, org.clone());
        Ok(org)
    }

    async fn organization(&self, id: &OrganizationId) -> LookupResult<Organization> {
        self.read()?
            .organizations
            .get(id)
            .cloned()
            .ok_or(LookupError::NotFound)
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, ServiceError> {
        let mut orgs: Vec<Organization> = self.read()?.organizations.values().cloned().collect();
        orgs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orgs)
    }

    async fn delete_organization(&self, id: &OrganizationId) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        state.memberships.retain(|_, m| m.organization_id != *id);
        state.organizations.remove(id);
        Ok(())
    }

    async fn add_member(
        &self,
        organization: &OrganizationId,
        user: &IdentityId,
        role: OrgRoleKind,
    ) -> Result<Membership, ServiceError> {
        let mut state = self.write()?;
        if !state.organizations.contains_key(organization) {
            return Err(ServiceError::new(
                "23503",
                format!("organization {organization} does not exist"),
            ));
        }
        if state.memberships.contains_key(user) {
            return Err(ServiceError::new(
                "23505",
                format!("identity {user} already belongs to an organization"),
            ));
        }
        let membership = Membership {
            organization_id: organization.clone(),
            user_id: user.clone(),
            role,
            created_at: Utc::now(),
        };
        state.memberships.insert(user.clone(), membership.clone());
        Ok(membership)
    }

    async fn remove_member(
        &self,
        organization: &OrganizationId,
        user: &IdentityId,
        role: OrgRoleKind,
    ) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        match state.memberships.get(user) {
            Some(m) if m.organization_id == *organization && m.role == role => {
                state.memberships.remove(user);
                Ok(())
            }
            _ => Err(ServiceError::no_rows()),
        }
    }

    async fn list_members(&self, organization: &OrganizationId) -> Result<Vec<Membership>, ServiceError> {
        let mut members: Vec<Membership> = self
            .read()?
            .memberships
            .values()
            .filter(|m| m.organization_id == *organization)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.user_id.cmp(&b.user_id)));
        Ok(members)
    }
}
