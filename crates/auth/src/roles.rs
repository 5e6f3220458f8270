use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tenantgate_core::{DomainError, OrganizationId};

/// Role held inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgRoleKind {
    Admin,
    Vendor,
}

impl OrgRoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRoleKind::Admin => "admin",
            OrgRoleKind::Vendor => "vendor",
        }
    }
}

impl core::fmt::Display for OrgRoleKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrgRoleKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(OrgRoleKind::Admin),
            "vendor" => Ok(OrgRoleKind::Vendor),
            other => Err(DomainError::validation(format!(
                "unknown organization role '{other}'"
            ))),
        }
    }
}

/// A principal's membership in exactly one organization.
///
/// At most one exists per identity, and never alongside developer status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationRole {
    pub organization_id: OrganizationId,
    pub role: OrgRoleKind,
}

impl OrganizationRole {
    pub fn new(organization_id: OrganizationId, role: OrgRoleKind) -> Self {
        Self {
            organization_id,
            role,
        }
    }

    pub fn admin(organization_id: OrganizationId) -> Self {
        Self::new(organization_id, OrgRoleKind::Admin)
    }

    pub fn vendor(organization_id: OrganizationId) -> Self {
        Self::new(organization_id, OrgRoleKind::Vendor)
    }

    pub fn is_admin(&self) -> bool {
        self.role == OrgRoleKind::Admin
    }
}

impl core::fmt::Display for OrganizationRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.role, self.organization_id)
    }
}
