//! Route guard: admission control for protected destinations.
//!
//! The guard only answers "is there a session at all". Which dashboard a
//! user may see is decided by where the role resolver navigates.

use serde::Serialize;

use crate::navigation::Destination;
use crate::store::{SessionError, SessionSnapshot, SessionSubscription};

/// Guard view of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    /// Restore check still running; neither admit nor redirect.
    Loading,
    Unauthenticated,
    Authenticated,
}

impl GuardState {
    pub fn of(snapshot: &SessionSnapshot) -> Self {
        if snapshot.is_loading() {
            GuardState::Loading
        } else if snapshot.identity.is_some() {
            GuardState::Authenticated
        } else {
            GuardState::Unauthenticated
        }
    }
}

/// Result of evaluating a guard.
#[derive(Debug, PartialEq, Eq)]
pub enum GuardDecision<'a, T> {
    /// Render nothing (or a neutral placeholder) and wait.
    Pending,
    Redirect(Destination),
    Render(&'a T),
}

/// Wraps a protected destination (a view, a handler, a route target).
#[derive(Debug, Clone)]
pub struct RouteGuard<T> {
    protected: T,
}

impl<T> RouteGuard<T> {
    pub fn new(protected: T) -> Self {
        Self { protected }
    }

    pub fn protected(&self) -> &T {
        &self.protected
    }

    pub fn evaluate(&self, snapshot: &SessionSnapshot) -> GuardDecision<'_, T> {
        match GuardState::of(snapshot) {
            GuardState::Loading => GuardDecision::Pending,
            GuardState::Unauthenticated => GuardDecision::Redirect(Destination::Login),
            GuardState::Authenticated => GuardDecision::Render(&self.protected),
        }
    }

    /// Wait for the restore check to finish, then evaluate.
    pub async fn admit(
        &self,
        subscription: &mut SessionSubscription,
    ) -> Result<GuardDecision<'_, T>, SessionError> {
        let snapshot = subscription.wait_ready().await?;
        Ok(self.evaluate(&snapshot))
    }
}
