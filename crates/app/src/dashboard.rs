use serde::Serialize;
use thiserror::Error;

use tenantgate_auth::{
    AccessLevel, AuthzError, Identity, OrgRoleKind, OrganizationRole, ProvisioningAction,
    authorize_provisioning,
};
use tenantgate_core::OrganizationId;
use tenantgate_session::{Destination, SessionSnapshot};

/// Which role dashboard is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardKind {
    Developer,
    Admin,
    Vendor,
}

impl DashboardKind {
    /// The dashboard behind a protected destination, if any.
    pub fn for_destination(destination: Destination) -> Option<Self> {
        match destination {
            Destination::DeveloperHome => Some(DashboardKind::Developer),
            Destination::AdminHome => Some(DashboardKind::Admin),
            Destination::VendorHome => Some(DashboardKind::Vendor),
            _ => None,
        }
    }

    pub fn destination(&self) -> Destination {
        match self {
            DashboardKind::Developer => Destination::DeveloperHome,
            DashboardKind::Admin => Destination::AdminHome,
            DashboardKind::Vendor => Destination::VendorHome,
        }
    }

    fn admits(&self, access: &AccessLevel) -> bool {
        match (self, access) {
            (DashboardKind::Developer, AccessLevel::Developer) => true,
            (DashboardKind::Admin, AccessLevel::Organization(role)) => role.role == OrgRoleKind::Admin,
            (DashboardKind::Vendor, AccessLevel::Organization(role)) => role.role == OrgRoleKind::Vendor,
            _ => false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DashboardError {
    #[error("no active session")]
    NotSignedIn,

    #[error("role for {0} has not been resolved yet")]
    Unresolved(Identity),

    #[error("{access} may not open the {requested:?} dashboard")]
    Mismatch {
        requested: DashboardKind,
        access: AccessLevel,
    },
}

/// Read-only session view handed to a role dashboard.
///
/// Only constructible when the resolved access level matches the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardContext {
    kind: DashboardKind,
    identity: Identity,
    access: AccessLevel,
}

impl DashboardContext {
    pub fn build(kind: DashboardKind, snapshot: &SessionSnapshot) -> Result<Self, DashboardError> {
        let identity = snapshot.identity.clone().ok_or(DashboardError::NotSignedIn)?;
        let access = snapshot
            .access
            .clone()
            .ok_or_else(|| DashboardError::Unresolved(identity.clone()))?;

        if !kind.admits(&access) {
            return Err(DashboardError::Mismatch {
                requested: kind,
                access,
            });
        }

        Ok(Self {
            kind,
            identity,
            access,
        })
    }

    pub fn kind(&self) -> DashboardKind {
        self.kind
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn access(&self) -> &AccessLevel {
        &self.access
    }

    /// `None` on the developer dashboard.
    pub fn organization_role(&self) -> Option<&OrganizationRole> {
        self.access.organization_role()
    }

    pub fn organization_id(&self) -> Option<&OrganizationId> {
        self.organization_role().map(|role| &role.organization_id)
    }

    pub fn authorize(&self, action: &ProvisioningAction) -> Result<(), AuthzError> {
        authorize_provisioning(&self.access, action)
    }
}
