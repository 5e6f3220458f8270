//! Identity service contract (consumed, never implemented by the core).
//!
//! The backend exposes session-issuing authentication plus two lookup tables:
//! the developer registry and the organization-membership registry. A lookup
//! that finds nothing is an expected outcome and is kept structurally apart
//! from a genuine failure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenantgate_core::IdentityId;

use crate::{AuthSession, Credentials, OrganizationRole, TokenValidationError};

/// Sentinel error code the backend uses for "query matched no row".
pub const NO_ROWS_CODE: &str = "PGRST116";

/// Raw failure reported by the identity service.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("identity service error {code}: {message}")]
pub struct ServiceError {
    pub code: String,
    pub message: String,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The backend's "no row" response.
    pub fn no_rows() -> Self {
        Self::new(NO_ROWS_CODE, "query returned no rows")
    }

    pub fn is_no_rows(&self) -> bool {
        self.code == NO_ROWS_CODE
    }
}

/// Outcome of a registry lookup that did not produce a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The registry legitimately has no record for the identity.
    #[error("no matching record")]
    NotFound,

    /// Transport or backend failure; the lookup result is unknown.
    #[error(transparent)]
    Service(ServiceError),
}

impl From<ServiceError> for LookupError {
    fn from(err: ServiceError) -> Self {
        if err.is_no_rows() {
            LookupError::NotFound
        } else {
            LookupError::Service(err)
        }
    }
}

pub type LookupResult<T> = Result<T, LookupError>;

/// Collapse a lookup into "found or not", keeping genuine failures apart.
pub fn found<T>(result: LookupResult<T>) -> Result<Option<T>, ServiceError> {
    match result {
        Ok(record) => Ok(Some(record)),
        Err(LookupError::NotFound) => Ok(None),
        Err(LookupError::Service(err)) => Err(err),
    }
}

/// Authentication failure (sign-in, session restore, sign-out).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid session: {0}")]
    InvalidSession(#[from] TokenValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Row of the developer registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeveloperRecord {
    pub user_id: IdentityId,
}

/// Query/response contract of the external identity service.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// Look up the developer registry row for `identity`.
    async fn find_developer(&self, identity: &IdentityId) -> LookupResult<DeveloperRecord>;

    /// Look up the organization membership (organization id + role) for `identity`.
    async fn find_org_membership(&self, identity: &IdentityId) -> LookupResult<OrganizationRole>;

    /// Return a previously issued session, if the backend still holds one.
    async fn restored_session(&self) -> Result<Option<AuthSession>, AuthError>;

    /// Authenticate with login-form credentials.
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthSession, AuthError>;

    /// Invalidate the current backend session.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

#[async_trait::async_trait]
impl<S> IdentityService for Arc<S>
where
    S: IdentityService + ?Sized,
{
    async fn find_developer(&self, identity: &IdentityId) -> LookupResult<DeveloperRecord> {
        (**self).find_developer(identity).await
    }

    async fn find_org_membership(&self, identity: &IdentityId) -> LookupResult<OrganizationRole> {
        (**self).find_org_membership(identity).await
    }

    async fn restored_session(&self) -> Result<Option<AuthSession>, AuthError> {
        (**self).restored_session().await
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
        (**self).sign_in(credentials).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        (**self).sign_out().await
    }
}
