//! Provisioning contract exposed to the dashboards.
//!
//! The core never provisions anything itself; it only states what a backend
//! must offer so that dashboards can manage organizations and memberships.
//! Callers check [`crate::authorize_provisioning`] before invoking these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenantgate_core::{IdentityId, OrganizationId};

use crate::{LookupResult, OrgRoleKind, OrganizationRole, ServiceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Row of the organization-membership registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub organization_id: OrganizationId,
    pub user_id: IdentityId,
    pub role: OrgRoleKind,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn organization_role(&self) -> OrganizationRole {
        OrganizationRole::new(self.organization_id.clone(), self.role)
    }
}

#[async_trait::async_trait]
pub trait Provisioning: Send + Sync {
    async fn create_organization(&self, name: &str) -> Result<Organization, ServiceError>;

    async fn organization(&self, id: &OrganizationId) -> LookupResult<Organization>;

    async fn list_organizations(&self) -> Result<Vec<Organization>, ServiceError>;

    /// Delete an organization together with all of its memberships.
    async fn delete_organization(&self, id: &OrganizationId) -> Result<(), ServiceError>;

    /// Register `user` in `organization`; an identity holds at most one membership.
    async fn add_member(
        &self,
        organization: &OrganizationId,
        user: &IdentityId,
        role: OrgRoleKind,
    ) -> Result<Membership, ServiceError>;

    /// Delete the membership of `user` in `organization`, only if it holds
    /// `role`; otherwise nothing is deleted and a no-rows error is returned.
    async fn remove_member(
        &self,
        organization: &OrganizationId,
        user: &IdentityId,
        role: OrgRoleKind,
    ) -> Result<(), ServiceError>;

    async fn list_members(&self, organization: &OrganizationId) -> Result<Vec<Membership>, ServiceError>;
}
