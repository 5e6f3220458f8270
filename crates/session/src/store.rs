//! Session store: the single source of truth for "who is logged in" and
//! "what access they resolved to".
//!
//! The store is an explicitly owned handle (cheap to clone) rather than
//! ambient global state. State changes are published as immutable
//! [`SessionSnapshot`]s over a `tokio::sync::watch` channel; route guards and
//! dashboards subscribe instead of polling.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ── Loading ──initialize()──> Ready { identity: Some | None }
//!                                      │  sign_in / establish   (generation + 1)
//!                                      │  record_resolution     (access)
//!                                      └─ sign_out              (generation + 1)
//! ```
//!
//! While `Loading`, consumers must treat the session as indeterminate.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use tenantgate_auth::{
    AccessLevel, AuthError, AuthSession, Credentials, Identity, IdentityService, OrganizationRole,
};
use tenantgate_core::IdentityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// The initial restore check has not completed.
    Loading,
    Ready,
}

/// Immutable view of the session state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub identity: Option<Identity>,

    /// Outcome of the last resolution pass for the current identity.
    pub access: Option<AccessLevel>,

    /// Advances on every identity change (restore, sign-in, sign-out).
    pub generation: u64,
}

impl SessionSnapshot {
    fn initial() -> Self {
        Self {
            phase: SessionPhase::Loading,
            identity: None,
            access: None,
            generation: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == SessionPhase::Loading
    }

    /// Non-`None` iff the last resolution outcome was an organization role.
    pub fn organization_role(&self) -> Option<&OrganizationRole> {
        self.access.as_ref().and_then(AccessLevel::organization_role)
    }

    /// Key of the resolution pass that may write for this snapshot.
    pub fn ticket(&self) -> Option<ResolutionTicket> {
        self.identity.as_ref().map(|identity| ResolutionTicket {
            identity: identity.id.clone(),
            generation: self.generation,
        })
    }
}

/// Identity and session generation a resolution pass was started for.
///
/// A pass may only write while its ticket still matches the store; signing
/// out and back in as the same identity yields a different ticket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionTicket {
    pub identity: IdentityId,
    pub generation: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("resolution for {identity} (generation {generation}) was superseded")]
    Superseded { identity: IdentityId, generation: u64 },

    #[error("session store was dropped")]
    Closed,
}

impl SessionError {
    fn superseded(ticket: &ResolutionTicket) -> Self {
        Self::Superseded {
            identity: ticket.identity.clone(),
            generation: ticket.generation,
        }
    }
}

struct Inner {
    service: Arc<dyn IdentityService>,
    state: watch::Sender<SessionSnapshot>,
}

/// Process-wide session state holder, injected by handle.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl core::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a store in the `Loading` phase.
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::initial());
        Self {
            inner: Arc::new(Inner { service, state }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    pub fn organization_role(&self) -> Option<OrganizationRole> {
        self.inner.state.borrow().organization_role().cloned()
    }

    pub fn access_level(&self) -> Option<AccessLevel> {
        self.inner.state.borrow().access.clone()
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.inner.state.subscribe(),
        }
    }

    /// Wait until the initial restore check has completed.
    pub async fn ready(&self) -> SessionSnapshot {
        // The store holds the sender, so the channel cannot close while `self` lives.
        let mut subscription = self.subscribe();
        match subscription.wait_ready().await {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }

    /// Run the one-time restore check and leave the `Loading` phase.
    ///
    /// A failed or expired restore leaves the session absent. Calling this
    /// again after the store is ready is a no-op.
    pub async fn initialize(&self) {
        if !self.is_loading() {
            return;
        }

        let restored = match self.inner.service.restored_session().await {
            Ok(Some(session)) => match session.validate(Utc::now()) {
                Ok(()) => Some(session.identity),
                Err(err) => {
                    tracing::warn!(identity = %session.identity, error = %err, "discarding restored session");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "session restore failed");
                None
            }
        };

        self.inner.state.send_if_modified(|state| {
            if !state.is_loading() {
                return false;
            }
            state.phase = SessionPhase::Ready;
            if restored.is_some() {
                state.generation += 1;
                state.identity = restored.clone();
                state.access = None;
            }
            true
        });

        let snapshot = self.snapshot();
        match &snapshot.identity {
            Some(identity) => tracing::info!(identity = %identity, generation = snapshot.generation, "session restored"),
            None => tracing::info!("no session to restore"),
        }
    }

    /// Authenticate through the identity service and adopt the new session.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let session = self.inner.service.sign_in(credentials).await.map_err(|err| {
            tracing::warn!(email = %credentials.email, error = %err, "sign-in failed");
            err
        })?;
        self.establish(session)
    }

    /// Adopt a session issued by the authentication subsystem.
    pub fn establish(&self, session: AuthSession) -> Result<Identity, AuthError> {
        session.validate(Utc::now())?;
        let identity = session.identity;

        self.inner.state.send_modify(|state| {
            state.phase = SessionPhase::Ready;
            state.identity = Some(identity.clone());
            state.access = None;
            state.generation += 1;
        });

        tracing::info!(identity = %identity, generation = self.inner.state.borrow().generation, "session established");
        Ok(identity)
    }

    /// Overwrite the stored organization role.
    ///
    /// `Some` stores an organization classification. `None` only clears an
    /// organization classification; a developer or unauthorized
    /// classification has no organization role and is left as is.
    pub fn set_organization_role(&self, role: Option<OrganizationRole>) {
        self.inner.state.send_if_modified(|state| match role {
            Some(role) => {
                state.access = Some(AccessLevel::Organization(role));
                true
            }
            None if matches!(state.access, Some(AccessLevel::Organization(_))) => {
                state.access = None;
                true
            }
            None => false,
        });
    }

    /// Unconditionally overwrite the stored classification.
    pub fn set_access_level(&self, access: AccessLevel) {
        self.inner.state.send_modify(|state| {
            state.access = Some(access);
        });
    }

    /// Whether `ticket` still describes the live session.
    pub fn is_current(&self, ticket: &ResolutionTicket) -> bool {
        self.inner.state.borrow().ticket().as_ref() == Some(ticket)
    }

    /// Store a resolution outcome, unless the pass has been superseded.
    ///
    /// The ticket check and the write happen atomically.
    pub fn record_resolution(
        &self,
        ticket: &ResolutionTicket,
        access: AccessLevel,
    ) -> Result<(), SessionError> {
        let applied = self.inner.state.send_if_modified(|state| {
            if state.ticket().as_ref() != Some(ticket) {
                return false;
            }
            state.access = Some(access);
            true
        });

        if applied {
            Ok(())
        } else {
            Err(SessionError::superseded(ticket))
        }
    }

    /// Invalidate the backend session, then clear identity and access.
    ///
    /// On failure the store keeps its prior state.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Err(err) = self.inner.service.sign_out().await {
            tracing::warn!(error = %err, "sign-out failed; keeping session");
            return Err(err);
        }

        let previous = self.current_identity();
        self.inner.state.send_modify(|state| {
            if state.identity.is_some() {
                state.generation += 1;
            }
            state.phase = SessionPhase::Ready;
            state.identity = None;
            state.access = None;
        });

        if let Some(identity) = previous {
            tracing::info!(identity = %identity, "signed out");
        }
        Ok(())
    }
}

/// Subscription to session state changes.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: watch::Receiver<SessionSnapshot>,
}

impl SessionSubscription {
    /// The latest snapshot, marking it as seen.
    pub fn current(&mut self) -> SessionSnapshot {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for the next state change.
    pub async fn changed(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.receiver.changed().await.map_err(|_| SessionError::Closed)?;
        Ok(self.current())
    }

    /// Wait until the store has left the `Loading` phase.
    pub async fn wait_ready(&mut self) -> Result<SessionSnapshot, SessionError> {
        let snapshot = self
            .receiver
            .wait_for(|state| !state.is_loading())
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(snapshot.clone())
    }
}
