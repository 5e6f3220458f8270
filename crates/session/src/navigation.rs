//! Logical navigation destinations and the navigator seam.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use tenantgate_auth::{AccessLevel, OrgRoleKind};

/// Logical destinations the core can send a user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    Login,
    /// Where the role resolver runs after authentication.
    ValidateRole,
    DeveloperHome,
    AdminHome,
    VendorHome,
    Unauthorized,
}

impl Destination {
    /// The home destination for a resolved classification.
    pub fn for_access(access: &AccessLevel) -> Self {
        match access {
            AccessLevel::Developer => Destination::DeveloperHome,
            AccessLevel::Organization(role) => match role.role {
                OrgRoleKind::Admin => Destination::AdminHome,
                OrgRoleKind::Vendor => Destination::VendorHome,
            },
            AccessLevel::Unauthorized => Destination::Unauthorized,
        }
    }

    /// Role homes sit behind the route guard.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Destination::DeveloperHome | Destination::AdminHome | Destination::VendorHome
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Destination::Login => "login",
            Destination::ValidateRole => "validate-role",
            Destination::DeveloperHome => "developer-home",
            Destination::AdminHome => "admin-home",
            Destination::VendorHome => "vendor-home",
            Destination::Unauthorized => "unauthorized",
        }
    }
}

impl core::fmt::Display for Destination {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Navigation side effect (the UI router, a terminal, a test recorder).
pub trait Navigator: Send + Sync {
    fn navigate(&self, to: Destination);
}

impl<N> Navigator for Arc<N>
where
    N: Navigator + ?Sized,
{
    fn navigate(&self, to: Destination) {
        (**self).navigate(to)
    }
}

/// Navigator that records every navigation in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<Destination>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Destination> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Destination> {
        self.history.lock().ok().and_then(|h| h.last().copied())
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, to: Destination) {
        tracing::debug!(destination = %to, "navigate");
        if let Ok(mut history) = self.history.lock() {
            history.push(to);
        }
    }
}
