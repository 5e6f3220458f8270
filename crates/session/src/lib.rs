//! `tenantgate-session`: session state, role resolution and route guarding.
//!
//! - [`SessionStore`]: who is logged in and what they resolved to (observable)
//! - [`RoleResolver`]: priority-ordered classification, one pass per session
//! - [`RouteGuard`] / [`RouteTable`]: admission control for destinations

pub mod guard;
pub mod navigation;
pub mod resolver;
pub mod routes;
pub mod store;

pub use guard::{GuardDecision, GuardState, RouteGuard};
pub use navigation::{Destination, Navigator, RecordingNavigator};
pub use resolver::{ResolutionOutcome, ResolverPhase, RoleResolver, classify};
pub use routes::{Admission, RouteMatch, RoutePaths, RouteTable};
pub use store::{
    ResolutionTicket, SessionError, SessionPhase, SessionSnapshot, SessionStore,
    SessionSubscription,
};
