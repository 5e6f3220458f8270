//! `tenantgate-auth`: identities, roles and the identity service contract.
//!
//! This crate is decoupled from routing and session state; it only describes
//! who a principal is and what the backend can tell us about them.

pub mod access;
pub mod authorize;
pub mod claims;
pub mod memory;
pub mod principal;
pub mod provisioning;
pub mod roles;
pub mod service;

pub use access::AccessLevel;
pub use authorize::{AuthzError, ProvisioningAction, authorize_provisioning};
pub use claims::{AuthSession, SessionClaims, TokenValidationError, validate_claims};
pub use memory::{Call, IdentityFixture, InMemoryIdentityService, Operation};
pub use principal::{Credentials, Identity};
pub use provisioning::{Membership, Organization, Provisioning};
pub use roles::{OrgRoleKind, OrganizationRole};
pub use service::{
    AuthError, DeveloperRecord, IdentityService, LookupError, LookupResult, NO_ROWS_CODE,
    ServiceError, found,
};
