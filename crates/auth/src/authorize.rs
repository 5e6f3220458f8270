//! Authorization of provisioning actions issued from the dashboards.
//!
//! Developers manage organizations; admins manage vendors inside their own
//! organization; vendors may only view their organization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenantgate_core::OrganizationId;

use crate::{AccessLevel, Membership, OrgRoleKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("organization mismatch: acting in {acting}, target is {target}")]
    OrganizationMismatch {
        acting: OrganizationId,
        target: OrganizationId,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Actions a dashboard may request against the identity backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProvisioningAction {
    CreateOrganization,
    DeleteOrganization {
        organization_id: OrganizationId,
    },
    AddMember {
        organization_id: OrganizationId,
        role: OrgRoleKind,
    },
    /// `role` is the role the member holds; build it from the stored
    /// membership with [`ProvisioningAction::remove`].
    RemoveMember {
        organization_id: OrganizationId,
        role: OrgRoleKind,
    },
    ViewOrganization {
        organization_id: OrganizationId,
    },
}

impl ProvisioningAction {
    /// Removal of an existing membership, with the role it actually holds.
    pub fn remove(membership: &Membership) -> Self {
        ProvisioningAction::RemoveMember {
            organization_id: membership.organization_id.clone(),
            role: membership.role,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProvisioningAction::CreateOrganization => "create_organization",
            ProvisioningAction::DeleteOrganization { .. } => "delete_organization",
            ProvisioningAction::AddMember { .. } => "add_member",
            ProvisioningAction::RemoveMember { .. } => "remove_member",
            ProvisioningAction::ViewOrganization { .. } => "view_organization",
        }
    }

    fn target_organization(&self) -> Option<&OrganizationId> {
        match self {
            ProvisioningAction::CreateOrganization => None,
            ProvisioningAction::DeleteOrganization { organization_id }
            | ProvisioningAction::AddMember { organization_id, .. }
            | ProvisioningAction::RemoveMember { organization_id, .. }
            | ProvisioningAction::ViewOrganization { organization_id } => Some(organization_id),
        }
    }
}

/// Authorize a provisioning action for a resolved access level.
///
/// - No IO
/// - No panics
pub fn authorize_provisioning(
    access: &AccessLevel,
    action: &ProvisioningAction,
) -> Result<(), AuthzError> {
    let role = match access {
        AccessLevel::Developer => return Ok(()),
        AccessLevel::Unauthorized => {
            return Err(AuthzError::Forbidden(format!(
                "unauthorized identities may not {}",
                action.name()
            )));
        }
        AccessLevel::Organization(role) => role,
    };

    if let Some(target) = action.target_organization() {
        if *target != role.organization_id {
            return Err(AuthzError::OrganizationMismatch {
                acting: role.organization_id.clone(),
                target: target.clone(),
            });
        }
    }

    let allowed = match (role.role, action) {
        (_, ProvisioningAction::ViewOrganization { .. }) => true,
        (OrgRoleKind::Admin, ProvisioningAction::AddMember { role, .. })
        | (OrgRoleKind::Admin, ProvisioningAction::RemoveMember { role, .. }) => {
            *role == OrgRoleKind::Vendor
        }
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(format!(
            "{} may not {}",
            role.role,
            action.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OrganizationRole;

    fn org(id: &str) -> OrganizationId {
        OrganizationId::parse(id).unwrap()
    }

    fn add_vendor(org_id: &str) -> ProvisioningAction {
        ProvisioningAction::AddMember {
            organization_id: org(org_id),
            role: OrgRoleKind::Vendor,
        }
    }

    #[test]
    fn developer_may_do_everything() {
        let dev = AccessLevel::Developer;
        assert!(authorize_provisioning(&dev, &ProvisioningAction::CreateOrganization).is_ok());
        assert!(
            authorize_provisioning(
                &dev,
                &ProvisioningAction::DeleteOrganization { organization_id: org("org-1") }
            )
            .is_ok()
        );
        assert!(
            authorize_provisioning(
                &dev,
                &ProvisioningAction::AddMember {
                    organization_id: org("org-1"),
                    role: OrgRoleKind::Admin,
                }
            )
            .is_ok()
        );
    }

    #[test]
    fn admin_manages_vendors_in_own_organization_only() {
        let admin = AccessLevel::from(OrganizationRole::admin(org("org-1")));

        assert!(authorize_provisioning(&admin, &add_vendor("org-1")).is_ok());
        assert!(matches!(
            authorize_provisioning(&admin, &add_vendor("org-2")),
            Err(AuthzError::OrganizationMismatch { .. })
        ));
        assert!(matches!(
            authorize_provisioning(
                &admin,
                &ProvisioningAction::AddMember {
                    organization_id: org("org-1"),
                    role: OrgRoleKind::Admin,
                }
            ),
            Err(AuthzError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_provisioning(&admin, &ProvisioningAction::CreateOrganization),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn removal_is_judged_on_the_stored_role() {
        let admin = AccessLevel::from(OrganizationRole::admin(org("org-1")));
        let member = |role| Membership {
            organization_id: org("org-1"),
            user_id: tenantgate_core::IdentityId::parse("M1").unwrap(),
            role,
            created_at: chrono::Utc::now(),
        };

        assert!(authorize_provisioning(&admin, &ProvisioningAction::remove(&member(OrgRoleKind::Vendor))).is_ok());
        assert!(matches!(
            authorize_provisioning(&admin, &ProvisioningAction::remove(&member(OrgRoleKind::Admin))),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn vendor_may_only_view_own_organization() {
        let vendor = AccessLevel::from(OrganizationRole::vendor(org("org-1")));

        assert!(
            authorize_provisioning(
                &vendor,
                &ProvisioningAction::ViewOrganization { organization_id: org("org-1") }
            )
            .is_ok()
        );
        assert!(authorize_provisioning(&vendor, &add_vendor("org-1")).is_err());
    }

    #[test]
    fn unauthorized_is_always_forbidden() {
        let err = authorize_provisioning(
            &AccessLevel::Unauthorized,
            &ProvisioningAction::ViewOrganization { organization_id: org("org-1") },
        )
        .unwrap_err();
        assert_eq!(
            err,
            AuthzError::Forbidden("unauthorized identities may not view_organization".to_string())
        );
    }
}
