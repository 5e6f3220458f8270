use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenantgate_core::{IdentityId, SessionId};

use crate::Identity;

/// Claims of a backend-issued session (transport-agnostic).
///
/// Decoding and signature checks belong to the identity service; the core
/// only checks the time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject / identity the session was issued to.
    pub sub: IdentityId,

    pub session_id: SessionId,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("session subject does not match the identity it was issued for")]
    SubjectMismatch,
}

/// Deterministically validate session claims against `now`.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// A session as handed out by sign-in or session restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub identity: Identity,
    pub claims: SessionClaims,
}

impl AuthSession {
    /// Issue a fresh session for `identity`, valid for `ttl` from `now`.
    pub fn issue(identity: Identity, now: DateTime<Utc>, ttl: Duration) -> Self {
        let claims = SessionClaims {
            sub: identity.id.clone(),
            session_id: SessionId::new(),
            issued_at: now,
            expires_at: now + ttl,
        };
        Self { identity, claims }
    }

    /// Check the time window and that the claims belong to the carried identity.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
        if self.claims.sub != self.identity.id {
            return Err(TokenValidationError::SubjectMismatch);
        }
        validate_claims(&self.claims, now)
    }
}
