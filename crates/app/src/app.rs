//! Application wiring: one identity backend, one session store, one resolver.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use tenantgate_auth::{
    AuthError, AuthzError, Credentials, Identity, IdentityService, Membership, OrgRoleKind,
    Provisioning, ProvisioningAction, ServiceError,
};
use tenantgate_core::{IdentityId, OrganizationId};
use tenantgate_session::{
    Admission, Destination, Navigator, ResolutionOutcome, ResolverPhase, RoleResolver,
    RouteTable, SessionSnapshot, SessionStore,
};

use crate::config::GateConfig;
use crate::dashboard::{DashboardContext, DashboardError, DashboardKind};

/// What a path renders as, for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Session restore still running.
    Placeholder,
    /// Role validation in progress.
    CheckingPermissions,
    Login,
    Unauthorized { message: String },
    Dashboard(DashboardContext),
    Redirect(Destination),
}

impl core::fmt::Display for Screen {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Screen::Placeholder => f.write_str("loading"),
            Screen::CheckingPermissions => f.write_str("checking permissions"),
            Screen::Login => f.write_str("login"),
            Screen::Unauthorized { message } => write!(f, "unauthorized: {message}"),
            Screen::Dashboard(ctx) => write!(f, "{:?} dashboard for {} ({})", ctx.kind(), ctx.identity(), ctx.access()),
            Screen::Redirect(to) => write!(f, "redirect to {to}"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error("{user} is not a member of {organization}")]
    NotAMember {
        organization: OrganizationId,
        user: IdentityId,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub struct App<S> {
    config: GateConfig,
    service: Arc<S>,
    store: SessionStore,
    resolver: Arc<RoleResolver>,
    routes: RouteTable,
}

impl<S> App<S>
where
    S: IdentityService + Provisioning + 'static,
{
    pub fn new(config: GateConfig, service: Arc<S>, navigator: Arc<dyn Navigator>) -> Self {
        let backend: Arc<dyn IdentityService> = service.clone();
        let store = SessionStore::new(backend.clone());
        let resolver = Arc::new(RoleResolver::new(backend, store.clone(), navigator));
        let routes = RouteTable::new(config.routes.clone());

        Self {
            config,
            service,
            store,
            resolver,
            routes,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn resolver_phase(&self) -> ResolverPhase {
        self.resolver.phase()
    }

    /// Run the one-time session restore.
    pub async fn initialize(&self) {
        self.store.initialize().await;
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        self.store.sign_in(credentials).await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.store.sign_out().await
    }

    /// Run one resolution pass for the current session.
    pub async fn resolve(&self) -> ResolutionOutcome {
        self.resolver.resolve_current().await
    }

    /// Resolve every new session in the background until the store is dropped.
    pub fn spawn_resolver(&self) -> JoinHandle<()> {
        tokio::spawn(self.resolver.clone().run())
    }

    pub fn visit(&self, path: &str) -> Admission {
        self.routes.admit(path, &self.store.snapshot())
    }

    pub fn screen(&self, path: &str) -> Screen {
        self.screen_for(path, &self.store.snapshot())
    }

    /// Like [`App::screen`], after the restore check has finished.
    pub async fn screen_when_ready(&self, path: &str) -> Screen {
        let snapshot = self.store.ready().await;
        self.screen_for(path, &snapshot)
    }

    /// Add `user` to `organization` on behalf of the dashboard user.
    pub async fn add_member(
        &self,
        ctx: &DashboardContext,
        organization: &OrganizationId,
        user: &IdentityId,
        role: OrgRoleKind,
    ) -> Result<Membership, ProvisionError> {
        ctx.authorize(&ProvisioningAction::AddMember {
            organization_id: organization.clone(),
            role,
        })?;
        let membership = self.service.add_member(organization, user, role).await?;
        tracing::info!(actor = %ctx.identity(), organization = %organization, user = %user, role = %role, "member added");
        Ok(membership)
    }

    /// Remove `user` from `organization`, judged on the role the member
    /// actually holds.
    pub async fn remove_member(
        &self,
        ctx: &DashboardContext,
        organization: &OrganizationId,
        user: &IdentityId,
    ) -> Result<(), ProvisionError> {
        let membership = self
            .service
            .list_members(organization)
            .await?
            .into_iter()
            .find(|m| m.user_id == *user)
            .ok_or_else(|| ProvisionError::NotAMember {
                organization: organization.clone(),
                user: user.clone(),
            })?;

        ctx.authorize(&ProvisioningAction::remove(&membership))?;
        self.service
            .remove_member(organization, user, membership.role)
            .await?;
        tracing::info!(actor = %ctx.identity(), organization = %organization, user = %user, "member removed");
        Ok(())
    }

    fn screen_for(&self, path: &str, snapshot: &SessionSnapshot) -> Screen {
        match self.routes.admit(path, snapshot) {
            Admission::Pending => Screen::Placeholder,
            Admission::Redirect(to) => Screen::Redirect(to),
            Admission::Render(Destination::Login) => Screen::Login,
            Admission::Render(Destination::Unauthorized) => Screen::Unauthorized {
                message: self.config.unauthorized_message.clone(),
            },
            Admission::Render(Destination::ValidateRole) => validation_screen(snapshot),
            Admission::Render(destination) => match DashboardKind::for_destination(destination) {
                Some(kind) => dashboard_screen(kind, snapshot),
                None => Screen::Redirect(Destination::Login),
            },
        }
    }
}

fn validation_screen(snapshot: &SessionSnapshot) -> Screen {
    if snapshot.is_loading() {
        return Screen::CheckingPermissions;
    }
    match (&snapshot.identity, &snapshot.access) {
        (None, _) => Screen::Redirect(Destination::Login),
        (Some(_), Some(access)) => Screen::Redirect(Destination::for_access(access)),
        (Some(_), None) => Screen::CheckingPermissions,
    }
}

fn dashboard_screen(kind: DashboardKind, snapshot: &SessionSnapshot) -> Screen {
    match DashboardContext::build(kind, snapshot) {
        Ok(ctx) => Screen::Dashboard(ctx),
        Err(DashboardError::NotSignedIn) => Screen::Redirect(Destination::Login),
        // Deep link before the resolver ran.
        Err(DashboardError::Unresolved(_)) => Screen::Redirect(Destination::ValidateRole),
        Err(DashboardError::Mismatch { access, .. }) => {
            tracing::debug!(requested = ?kind, access = %access, "dashboard role mismatch");
            Screen::Redirect(Destination::for_access(&access))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantgate_auth::InMemoryIdentityService;
    use tenantgate_session::RecordingNavigator;

    use crate::config::load_fixture;

    fn app() -> (App<InMemoryIdentityService>, Arc<RecordingNavigator>) {
        let fixture = GateConfig::default().load_fixture().unwrap();
        let navigator = Arc::new(RecordingNavigator::new());
        let app = App::new(
            GateConfig::default(),
            Arc::new(InMemoryIdentityService::from_fixture(fixture)),
            navigator.clone(),
        );
        (app, navigator)
    }

    #[tokio::test]
    async fn loading_session_shows_placeholder() {
        let (app, _) = app();
        assert_eq!(app.screen("/vendor"), Screen::Placeholder);
        assert_eq!(app.screen("/login"), Screen::Login);
        assert_eq!(app.screen("/validate-role"), Screen::CheckingPermissions);
    }

    #[tokio::test]
    async fn vendor_sign_in_lands_on_vendor_dashboard() {
        let (app, navigator) = app();
        app.initialize().await;
        app.sign_in(&Credentials::new("vendor@example.com", "vendor-password"))
            .await
            .unwrap();

        assert_eq!(app.screen("/vendor"), Screen::Redirect(Destination::ValidateRole));
        assert_eq!(app.screen("/validate-role"), Screen::CheckingPermissions);

        let outcome = app.resolve().await;
        assert!(matches!(
            outcome,
            ResolutionOutcome::Resolved {
                destination: Destination::VendorHome,
                ..
            }
        ));
        assert_eq!(navigator.last(), Some(Destination::VendorHome));
        assert_eq!(app.resolver_phase(), ResolverPhase::Done);

        let Screen::Dashboard(ctx) = app.screen("/vendor/orders") else {
            panic!("expected vendor dashboard");
        };
        assert_eq!(ctx.kind(), DashboardKind::Vendor);
        assert_eq!(
            app.screen("/validate-role"),
            Screen::Redirect(Destination::VendorHome)
        );
        // Wrong dashboard sends the user to their own home.
        assert_eq!(app.screen("/admin"), Screen::Redirect(Destination::VendorHome));
    }

    #[tokio::test]
    async fn unauthorized_page_uses_configured_message() {
        let config = GateConfig {
            unauthorized_message: "Nope.".to_string(),
            ..GateConfig::default()
        };
        let service = Arc::new(InMemoryIdentityService::new());
        let app = App::new(config, service, Arc::new(RecordingNavigator::new()));

        assert_eq!(
            app.screen("/unauthorized"),
            Screen::Unauthorized {
                message: "Nope.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn sign_out_returns_to_login() {
        let (app, _) = app();
        app.initialize().await;
        app.sign_in(&Credentials::new("dev@example.com", "dev-password"))
            .await
            .unwrap();
        app.resolve().await;
        assert!(matches!(app.screen("/developer"), Screen::Dashboard(_)));

        app.sign_out().await.unwrap();
        assert_eq!(app.screen("/developer"), Screen::Redirect(Destination::Login));
        assert_eq!(app.visit("/developer"), Admission::Redirect(Destination::Login));
        assert_eq!(app.screen("/validate-role"), Screen::Redirect(Destination::Login));
    }

    #[tokio::test]
    async fn screen_when_ready_waits_for_restore() {
        let (app, _) = app();
        let app = Arc::new(app);

        let waiting = {
            let app = app.clone();
            tokio::spawn(async move { app.screen_when_ready("/admin").await })
        };
        tokio::task::yield_now().await;
        app.initialize().await;

        assert_eq!(waiting.await.unwrap(), Screen::Redirect(Destination::Login));
    }

    #[test]
    fn fixture_loader_is_shared_with_config() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/demo.json");
        let fixture = load_fixture(&path).unwrap();
        assert_eq!(fixture.organizations.len(), 1);
    }
}
