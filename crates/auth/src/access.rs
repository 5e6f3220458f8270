//! Role classification of an authenticated identity.

use serde::{Deserialize, Serialize};

use crate::{OrgRoleKind, OrganizationRole};

/// The mutually exclusive outcome of resolving an identity.
///
/// Classification is priority ordered: `Developer` wins over `Organization`,
/// which wins over `Unauthorized`. Developer status is stored explicitly here
/// instead of being inferred from where navigation landed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessLevel {
    /// Platform developer (present in the developer registry).
    Developer,

    /// Admin or vendor of one organization.
    Organization(OrganizationRole),

    /// Present in neither registry, or every lookup failed.
    Unauthorized,
}

impl AccessLevel {
    /// The organization role carried by this classification.
    ///
    /// `Some` only for [`AccessLevel::Organization`]; developers and
    /// unauthorized identities never carry one.
    pub fn organization_role(&self) -> Option<&OrganizationRole> {
        match self {
            AccessLevel::Organization(role) => Some(role),
            AccessLevel::Developer | AccessLevel::Unauthorized => None,
        }
    }

    pub fn is_developer(&self) -> bool {
        matches!(self, AccessLevel::Developer)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AccessLevel::Unauthorized)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccessLevel::Developer => "developer",
            AccessLevel::Organization(role) => match role.role {
                OrgRoleKind::Admin => "admin",
                OrgRoleKind::Vendor => "vendor",
            },
            AccessLevel::Unauthorized => "unauthorized",
        }
    }
}

impl From<OrganizationRole> for AccessLevel {
    fn from(role: OrganizationRole) -> Self {
        AccessLevel::Organization(role)
    }
}

impl core::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AccessLevel::Organization(role) => write!(f, "{role}"),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantgate_core::OrganizationId;

    fn org() -> OrganizationId {
        OrganizationId::parse("org-1").unwrap()
    }

    #[test]
    fn only_organization_level_carries_a_role() {
        assert!(AccessLevel::Developer.organization_role().is_none());
        assert!(AccessLevel::Unauthorized.organization_role().is_none());

        let level = AccessLevel::from(OrganizationRole::admin(org()));
        assert_eq!(level.organization_role(), Some(&OrganizationRole::admin(org())));
    }

    #[test]
    fn labels_follow_role_kind() {
        assert_eq!(AccessLevel::Developer.label(), "developer");
        assert_eq!(AccessLevel::from(OrganizationRole::vendor(org())).label(), "vendor");
        assert_eq!(AccessLevel::Unauthorized.to_string(), "unauthorized");
        assert_eq!(AccessLevel::from(OrganizationRole::admin(org())).to_string(), "admin@org-1");
    }

    #[test]
    fn serializes_as_tagged_union() {
        let json = serde_json::to_value(AccessLevel::from(OrganizationRole::vendor(org()))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "organization", "organization_id": "org-1", "role": "vendor" })
        );
        let dev = serde_json::to_value(AccessLevel::Developer).unwrap();
        assert_eq!(dev, serde_json::json!({ "kind": "developer" }));
    }
}
