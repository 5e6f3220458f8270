//! Role resolver: classifies a newly available identity and drives navigation.
//!
//! The two registry lookups run strictly one after the other so that an
//! identity present in both registries always resolves as developer. A lookup
//! failure is logged and treated as absence, so a backend hiccup can only
//! degrade a classification towards `Unauthorized`.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use tenantgate_auth::{AccessLevel, IdentityService, found};
use tenantgate_core::IdentityId;

use crate::navigation::{Destination, Navigator};
use crate::store::{ResolutionTicket, SessionStore};

/// Classify `identity` by querying the registries in priority order.
pub async fn classify(service: &dyn IdentityService, identity: &IdentityId) -> AccessLevel {
    classify_while(service, identity, || true)
        .await
        .unwrap_or(AccessLevel::Unauthorized)
}

/// Like [`classify`], but gives up (returning `None`) as soon as
/// `still_wanted` reports that the result would be discarded.
async fn classify_while<F>(
    service: &dyn IdentityService,
    identity: &IdentityId,
    still_wanted: F,
) -> Option<AccessLevel>
where
    F: Fn() -> bool,
{
    match found(service.find_developer(identity).await) {
        Ok(Some(_)) => return Some(AccessLevel::Developer),
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(identity = %identity, code = %err.code, error = %err, "developer lookup failed; treating as absent");
        }
    }

    if !still_wanted() {
        return None;
    }

    match found(service.find_org_membership(identity).await) {
        Ok(Some(role)) => return Some(AccessLevel::Organization(role)),
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(identity = %identity, code = %err.code, error = %err, "organization lookup failed; treating as absent");
        }
    }

    Some(AccessLevel::Unauthorized)
}

/// Whether a resolution pass is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverPhase {
    Idle,
    Checking,
    Done,
}

/// What one call to [`RoleResolver::resolve_current`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Classification stored and navigation issued.
    Resolved {
        access: AccessLevel,
        destination: Destination,
    },
    /// No identity; navigated to login without any lookup.
    RedirectedToLogin,
    /// The session changed while the pass was running; no navigation was
    /// issued.
    Superseded,
    /// This identity/session was already resolved (or is being resolved).
    AlreadyResolved,
}

#[derive(Debug)]
struct PassState {
    phase: ResolverPhase,
    in_flight: Option<ResolutionTicket>,
    last: Option<ResolutionTicket>,
}

/// One-shot classifier bound to a session store and a navigator.
pub struct RoleResolver {
    service: Arc<dyn IdentityService>,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    state: Mutex<PassState>,
}

impl RoleResolver {
    pub fn new(
        service: Arc<dyn IdentityService>,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            service,
            store,
            navigator,
            state: Mutex::new(PassState {
                phase: ResolverPhase::Idle,
                in_flight: None,
                last: None,
            }),
        }
    }

    pub fn phase(&self) -> ResolverPhase {
        self.state
            .lock()
            .map(|s| s.phase)
            .unwrap_or(ResolverPhase::Idle)
    }

    /// Resolve the store's current identity.
    ///
    /// Waits for the store's restore check first. Performs at most one
    /// classification write and one navigation, and none at all if the pass
    /// is superseded or the session was already resolved.
    pub async fn resolve_current(&self) -> ResolutionOutcome {
        let snapshot = self.store.ready().await;

        let Some(ticket) = snapshot.ticket() else {
            tracing::info!("no identity; redirecting to login");
            self.navigator.navigate(Destination::Login);
            return ResolutionOutcome::RedirectedToLogin;
        };

        if !self.begin(&ticket) {
            return ResolutionOutcome::AlreadyResolved;
        }

        let store = &self.store;
        let access = classify_while(self.service.as_ref(), &ticket.identity, || {
            store.is_current(&ticket)
        })
        .await;

        let recorded = match access {
            Some(access) => self
                .store
                .record_resolution(&ticket, access.clone())
                .map(|()| access)
                .map_err(|err| tracing::debug!(error = %err, "discarding resolution")),
            None => Err(()),
        };

        let Ok(access) = recorded else {
            tracing::debug!(identity = %ticket.identity, generation = ticket.generation, "resolution superseded");
            self.finish(&ticket, false);
            return ResolutionOutcome::Superseded;
        };

        let destination = Destination::for_access(&access);
        if !self.navigate_if_current(&ticket, destination) {
            tracing::debug!(identity = %ticket.identity, generation = ticket.generation, "session ended before navigation");
            self.finish(&ticket, false);
            return ResolutionOutcome::Superseded;
        }
        tracing::info!(identity = %ticket.identity, access = %access, destination = %destination, "role resolved");
        self.finish(&ticket, true);

        ResolutionOutcome::Resolved {
            access,
            destination,
        }
    }

    /// Resolve whenever the store gains an identity it has not resolved yet.
    ///
    /// Returns once the store is dropped.
    pub async fn run(self: Arc<Self>) {
        let mut subscription = self.store.subscribe();
        loop {
            let snapshot = subscription.current();
            if !snapshot.is_loading() {
                if let Some(ticket) = snapshot.ticket() {
                    if !self.already_handled(&ticket) {
                        self.resolve_current().await;
                    }
                }
            }

            if subscription.changed().await.is_err() {
                break;
            }
        }
    }

    /// Navigate only while `ticket` still describes the live session.
    fn navigate_if_current(&self, ticket: &ResolutionTicket, destination: Destination) -> bool {
        if !self.store.is_current(ticket) {
            return false;
        }
        self.navigator.navigate(destination);
        true
    }

    fn already_handled(&self, ticket: &ResolutionTicket) -> bool {
        self.state
            .lock()
            .map(|s| s.last.as_ref() == Some(ticket) || s.in_flight.as_ref() == Some(ticket))
            .unwrap_or(true)
    }

    /// Claim `ticket` for a new pass; `false` if it is done or running.
    fn begin(&self, ticket: &ResolutionTicket) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.last.as_ref() == Some(ticket) || state.in_flight.as_ref() == Some(ticket) {
            return false;
        }
        state.in_flight = Some(ticket.clone());
        state.phase = ResolverPhase::Checking;
        true
    }

    fn finish(&self, ticket: &ResolutionTicket, resolved: bool) {
        if let Ok(mut state) = self.state.lock() {
            if state.in_flight.as_ref() == Some(ticket) {
                state.in_flight = None;
            }
            if resolved {
                state.last = Some(ticket.clone());
                state.phase = ResolverPhase::Done;
            } else if state.in_flight.is_none() {
                state.phase = ResolverPhase::Idle;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::RecordingNavigator;
    use tenantgate_auth::{
        AuthError, AuthSession, Credentials, DeveloperRecord, InMemoryIdentityService,
        LookupResult, Operation, OrganizationRole, ServiceError,
    };
    use tenantgate_core::OrganizationId;
    use tokio::sync::Notify;

    fn id(s: &str) -> IdentityId {
        IdentityId::parse(s).unwrap()
    }

    fn org(s: &str) -> OrganizationId {
        OrganizationId::parse(s).unwrap()
    }

    fn seeded() -> Arc<InMemoryIdentityService> {
        let service = InMemoryIdentityService::new();
        for user in ["U1", "U2", "U3", "A1"] {
            service.add_account(&format!("{}@example.com", user.to_lowercase()), "pw", id(user));
        }
        service.set_membership(id("U1"), OrganizationRole::vendor(org("org-1")));
        service.add_developer(id("U2"));
        service.set_membership(id("U2"), OrganizationRole::admin(org("org-9")));
        service.set_membership(id("A1"), OrganizationRole::admin(org("org-1")));
        Arc::new(service)
    }

    struct Harness {
        service: Arc<InMemoryIdentityService>,
        store: SessionStore,
        navigator: Arc<RecordingNavigator>,
        resolver: RoleResolver,
    }

    async fn signed_in(user: &str) -> Harness {
        let service = seeded();
        let store = SessionStore::new(service.clone());
        store.initialize().await;
        store
            .sign_in(&Credentials::new(format!("{}@example.com", user.to_lowercase()), "pw"))
            .await
            .unwrap();
        let navigator = Arc::new(RecordingNavigator::new());
        let resolver = RoleResolver::new(service.clone(), store.clone(), navigator.clone());
        Harness {
            service,
            store,
            navigator,
            resolver,
        }
    }

    fn lookups(service: &InMemoryIdentityService) -> Vec<Operation> {
        service
            .operations()
            .into_iter()
            .filter(|op| matches!(op, Operation::FindDeveloper | Operation::FindOrgMembership))
            .collect()
    }

    #[tokio::test]
    async fn vendor_resolves_to_vendor_home() {
        let h = signed_in("U1").await;

        let outcome = h.resolver.resolve_current().await;

        let expected = OrganizationRole::vendor(org("org-1"));
        assert_eq!(
            outcome,
            ResolutionOutcome::Resolved {
                access: AccessLevel::Organization(expected.clone()),
                destination: Destination::VendorHome,
            }
        );
        assert_eq!(h.store.organization_role(), Some(expected));
        assert_eq!(h.navigator.history(), vec![Destination::VendorHome]);
        assert_eq!(
            lookups(&h.service),
            vec![Operation::FindDeveloper, Operation::FindOrgMembership]
        );
    }

    #[tokio::test]
    async fn no_navigation_once_the_session_has_ended() {
        let h = signed_in("U1").await;
        let ticket = h.store.snapshot().ticket().unwrap();

        assert!(h.resolver.navigate_if_current(&ticket, Destination::VendorHome));
        h.store.sign_out().await.unwrap();
        assert!(!h.resolver.navigate_if_current(&ticket, Destination::VendorHome));

        assert_eq!(h.navigator.history(), vec![Destination::VendorHome]);
    }

    #[tokio::test]
    async fn admin_resolves_to_admin_home() {
        let h = signed_in("A1").await;

        h.resolver.resolve_current().await;

        let role = h.store.organization_role().unwrap();
        assert!(role.is_admin());
        assert_eq!(h.navigator.last(), Some(Destination::AdminHome));
    }

    #[tokio::test]
    async fn developer_wins_over_membership_and_skips_second_lookup() {
        let h = signed_in("U2").await;

        let outcome = h.resolver.resolve_current().await;

        assert_eq!(
            outcome,
            ResolutionOutcome::Resolved {
                access: AccessLevel::Developer,
                destination: Destination::DeveloperHome,
            }
        );
        assert_eq!(h.store.organization_role(), None);
        assert_eq!(h.store.access_level(), Some(AccessLevel::Developer));
        assert_eq!(lookups(&h.service), vec![Operation::FindDeveloper]);
    }

    #[tokio::test]
    async fn unknown_identity_is_unauthorized() {
        let h = signed_in("U3").await;

        h.resolver.resolve_current().await;

        assert_eq!(h.store.organization_role(), None);
        assert_eq!(h.store.access_level(), Some(AccessLevel::Unauthorized));
        assert_eq!(h.navigator.history(), vec![Destination::Unauthorized]);
    }

    #[tokio::test]
    async fn absent_identity_redirects_to_login_without_lookups() {
        let service = seeded();
        let store = SessionStore::new(service.clone());
        store.initialize().await;
        let navigator = Arc::new(RecordingNavigator::new());
        let resolver = RoleResolver::new(service.clone(), store, navigator.clone());

        assert_eq!(resolver.resolve_current().await, ResolutionOutcome::RedirectedToLogin);
        assert_eq!(navigator.history(), vec![Destination::Login]);
        assert!(lookups(&service).is_empty());
    }

    #[tokio::test]
    async fn developer_lookup_failure_falls_through_to_membership() {
        let h = signed_in("U2").await;
        h.service.fail(Operation::FindDeveloper, ServiceError::new("503", "unavailable"));

        h.resolver.resolve_current().await;

        // U2 also has an org record; the failed developer check degrades to it.
        assert_eq!(h.navigator.last(), Some(Destination::AdminHome));
    }

    #[tokio::test]
    async fn total_backend_failure_lands_on_unauthorized() {
        let h = signed_in("U1").await;
        h.service.fail(Operation::FindDeveloper, ServiceError::new("503", "unavailable"));
        h.service.fail(Operation::FindOrgMembership, ServiceError::new("503", "unavailable"));

        let outcome = h.resolver.resolve_current().await;

        assert_eq!(
            outcome,
            ResolutionOutcome::Resolved {
                access: AccessLevel::Unauthorized,
                destination: Destination::Unauthorized,
            }
        );
        assert_eq!(h.store.organization_role(), None);
    }

    #[tokio::test]
    async fn incidental_rerun_does_not_query_or_navigate_again() {
        let h = signed_in("U1").await;

        h.resolver.resolve_current().await;
        let again = h.resolver.resolve_current().await;

        assert_eq!(again, ResolutionOutcome::AlreadyResolved);
        assert_eq!(h.navigator.history().len(), 1);
        assert_eq!(lookups(&h.service).len(), 2);
        assert_eq!(h.resolver.phase(), ResolverPhase::Done);
    }

    #[tokio::test]
    async fn classify_is_deterministic_for_unchanged_registries() {
        let service = seeded();
        for user in ["U1", "U2", "U3", "A1"] {
            let first = classify(service.as_ref(), &id(user)).await;
            for _ in 0..3 {
                assert_eq!(classify(service.as_ref(), &id(user)).await, first);
            }
        }
    }

    #[tokio::test]
    async fn new_session_for_same_identity_resolves_again() {
        let h = signed_in("U1").await;
        h.resolver.resolve_current().await;

        h.store.sign_out().await.unwrap();
        h.store
            .sign_in(&Credentials::new("u1@example.com", "pw"))
            .await
            .unwrap();

        let outcome = h.resolver.resolve_current().await;
        assert!(matches!(outcome, ResolutionOutcome::Resolved { .. }));
        assert_eq!(
            h.navigator.history(),
            vec![Destination::VendorHome, Destination::VendorHome]
        );
    }

    /// Identity service whose developer lookup blocks until released.
    struct GatedService {
        inner: Arc<InMemoryIdentityService>,
        entered: Notify,
        release: Notify,
    }

    #[async_trait::async_trait]
    impl IdentityService for GatedService {
        async fn find_developer(&self, identity: &IdentityId) -> LookupResult<DeveloperRecord> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.find_developer(identity).await
        }

        async fn find_org_membership(&self, identity: &IdentityId) -> LookupResult<OrganizationRole> {
            self.inner.find_org_membership(identity).await
        }

        async fn restored_session(&self) -> Result<Option<AuthSession>, AuthError> {
            self.inner.restored_session().await
        }

        async fn sign_in(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
            self.inner.sign_in(credentials).await
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            self.inner.sign_out().await
        }
    }

    #[tokio::test]
    async fn sign_out_during_lookup_discards_the_pass() {
        let inner = seeded();
        let gated = Arc::new(GatedService {
            inner: inner.clone(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let store = SessionStore::new(gated.clone());
        store.initialize().await;
        store.sign_in(&Credentials::new("u1@example.com", "pw")).await.unwrap();

        let navigator = Arc::new(RecordingNavigator::new());
        let resolver = Arc::new(RoleResolver::new(gated.clone(), store.clone(), navigator.clone()));

        let pass = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve_current().await })
        };

        gated.entered.notified().await;
        assert_eq!(resolver.phase(), ResolverPhase::Checking);
        store.sign_out().await.unwrap();
        gated.release.notify_one();

        assert_eq!(pass.await.unwrap(), ResolutionOutcome::Superseded);
        assert!(navigator.history().is_empty());
        assert!(store.access_level().is_none());
        assert_eq!(resolver.phase(), ResolverPhase::Idle);
        // The membership lookup never started.
        assert!(!inner.operations().contains(&Operation::FindOrgMembership));
    }

    #[tokio::test]
    async fn run_resolves_each_new_session() {
        let service = seeded();
        let store = SessionStore::new(service.clone());
        let navigator = Arc::new(RecordingNavigator::new());
        let resolver = Arc::new(RoleResolver::new(service.clone(), store.clone(), navigator.clone()));
        let mut sub = store.subscribe();

        let worker = tokio::spawn(resolver.clone().run());

        store.initialize().await;
        store.sign_in(&Credentials::new("u1@example.com", "pw")).await.unwrap();

        // Wait until the resolver has written its classification.
        loop {
            let snapshot = sub.changed().await.unwrap();
            if snapshot.access.is_some() {
                break;
            }
        }
        assert_eq!(navigator.history(), vec![Destination::VendorHome]);

        worker.abort();
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn runtime() -> tokio::runtime::Runtime {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
        }

        fn membership() -> impl Strategy<Value = Option<OrganizationRole>> {
            prop_oneof![
                Just(None),
                "[a-z]{1,8}".prop_map(|o| Some(OrganizationRole::admin(org(&o)))),
                "[a-z]{1,8}".prop_map(|o| Some(OrganizationRole::vendor(org(&o)))),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: registry contents fully determine the classification,
            /// with developer taking priority over any membership.
            #[test]
            fn classification_follows_priority(
                user in "[A-Za-z0-9]{1,12}",
                is_developer in any::<bool>(),
                role in membership(),
                developer_lookup_fails in any::<bool>(),
            ) {
                let service = InMemoryIdentityService::new();
                if is_developer {
                    service.add_developer(id(&user));
                }
                if let Some(role) = role.clone() {
                    service.set_membership(id(&user), role);
                }
                if developer_lookup_fails {
                    service.fail(Operation::FindDeveloper, ServiceError::new("503", "unavailable"));
                }

                let access = runtime().block_on(classify(&service, &id(&user)));

                let expected = if is_developer && !developer_lookup_fails {
                    AccessLevel::Developer
                } else if let Some(role) = role {
                    AccessLevel::Organization(role)
                } else {
                    AccessLevel::Unauthorized
                };
                prop_assert_eq!(access.clone(), expected);
                // A failure never escalates: developer access requires a successful lookup.
                prop_assert!(!(developer_lookup_fails && access.is_developer()));
            }

            /// Property: re-running against unchanged data is deterministic.
            #[test]
            fn classification_is_idempotent(
                user in "[A-Za-z0-9]{1,12}",
                is_developer in any::<bool>(),
                role in membership(),
            ) {
                let service = InMemoryIdentityService::new();
                if is_developer {
                    service.add_developer(id(&user));
                }
                if let Some(role) = role {
                    service.set_membership(id(&user), role);
                }

                let rt = runtime();
                let first = rt.block_on(classify(&service, &id(&user)));
                let second = rt.block_on(classify(&service, &id(&user)));
                prop_assert_eq!(
                    Destination::for_access(&first),
                    Destination::for_access(&second)
                );
                prop_assert_eq!(first, second);
            }
        }
    }
}
