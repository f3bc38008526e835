use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vitrine_core::{AppError, AppResult};

/// Code of the role that short-circuits every permission check.
pub const SUPER_ADMIN_ROLE_CODE: &str = "super_admin";

const CODE_MAX_LENGTH: usize = 64;
const PERMISSION_CODE_MAX_LENGTH: usize = 128;

/// Lifecycle status shared by roles and permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Entity participates in permission resolution.
    Active,
    /// Entity is kept but grants nothing.
    Inactive,
}

impl EntityStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for EntityStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(AppError::validation(
                "status",
                format!("unknown status value '{value}'"),
            )),
        }
    }
}

/// Validated role code: lowercase letters, digits and underscores,
/// starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleCode(String);

impl RoleCode {
    /// Creates a validated role code.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into().trim().to_owned();
        let starts_with_letter = value
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_lowercase());

        if !starts_with_letter
            || value.len() > CODE_MAX_LENGTH
            || !value.chars().all(|character| {
                character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
            })
        {
            return Err(AppError::validation(
                "code",
                format!(
                    "role code '{value}' must start with a lowercase letter and contain only \
                     lowercase letters, digits or underscores (max {CODE_MAX_LENGTH})"
                ),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the role code that bypasses permission checks.
    #[must_use]
    pub fn super_admin() -> Self {
        Self(SUPER_ADMIN_ROLE_CODE.to_owned())
    }

    /// Returns whether this is the super-admin role code.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.0 == SUPER_ADMIN_ROLE_CODE
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for RoleCode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleCode> for String {
    fn from(value: RoleCode) -> Self {
        value.0
    }
}

impl Display for RoleCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Validated permission code: dot-separated lowercase segments such as
/// `product.edit`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionCode(String);

impl PermissionCode {
    /// Creates a validated permission code.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into().trim().to_owned();
        let segments_valid = value.split('.').all(|segment| {
            !segment.is_empty()
                && segment.chars().all(|character| {
                    character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
                })
        });

        if value.is_empty() || value.len() > PERMISSION_CODE_MAX_LENGTH || !segments_valid {
            return Err(AppError::validation(
                "code",
                format!(
                    "permission code '{value}' must be dot-separated segments of lowercase \
                     letters, digits or underscores (max {PERMISSION_CODE_MAX_LENGTH})"
                ),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for PermissionCode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PermissionCode> for String {
    fn from(value: PermissionCode) -> Self {
        value.0
    }
}

impl Display for PermissionCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Permissions the administrative backend itself checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinPermission {
    /// Allows managing roles and admin role assignments.
    RbacRoleManage,
    /// Allows managing permissions and role grants.
    RbacPermissionManage,
    /// Allows reading the audit log.
    AuditLogRead,
    /// Allows browsing catalog products.
    ProductView,
    /// Allows editing catalog products.
    ProductEdit,
    /// Allows deleting catalog products.
    ProductDelete,
    /// Allows managing marketplace links.
    LinkManage,
    /// Allows managing categories.
    CategoryManage,
    /// Allows managing badges.
    BadgeManage,
}

impl BuiltinPermission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RbacRoleManage => "rbac.role.manage",
            Self::RbacPermissionManage => "rbac.permission.manage",
            Self::AuditLogRead => "audit.log.read",
            Self::ProductView => "product.view",
            Self::ProductEdit => "product.edit",
            Self::ProductDelete => "product.delete",
            Self::LinkManage => "link.manage",
            Self::CategoryManage => "category.manage",
            Self::BadgeManage => "badge.manage",
        }
    }

    /// Returns a human-readable name used when seeding.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::RbacRoleManage => "Manage roles",
            Self::RbacPermissionManage => "Manage permissions",
            Self::AuditLogRead => "Read audit log",
            Self::ProductView => "View products",
            Self::ProductEdit => "Edit products",
            Self::ProductDelete => "Delete products",
            Self::LinkManage => "Manage marketplace links",
            Self::CategoryManage => "Manage categories",
            Self::BadgeManage => "Manage badges",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[BuiltinPermission] = &[
            BuiltinPermission::RbacRoleManage,
            BuiltinPermission::RbacPermissionManage,
            BuiltinPermission::AuditLogRead,
            BuiltinPermission::ProductView,
            BuiltinPermission::ProductEdit,
            BuiltinPermission::ProductDelete,
            BuiltinPermission::LinkManage,
            BuiltinPermission::CategoryManage,
            BuiltinPermission::BadgeManage,
        ];

        ALL
    }

    /// Returns the validated permission code.
    #[must_use]
    pub fn code(&self) -> PermissionCode {
        PermissionCode(self.as_str().to_owned())
    }
}

impl FromStr for BuiltinPermission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| {
                AppError::validation("code", format!("unknown permission value '{value}'"))
            })
    }
}

/// Stable audit actions emitted by access administration use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a role is created.
    RoleCreated,
    /// Emitted when role fields change.
    RoleUpdated,
    /// Emitted when a role is deleted.
    RoleDeleted,
    /// Emitted when a role is activated.
    RoleActivated,
    /// Emitted when a role is deactivated.
    RoleDeactivated,
    /// Emitted when a permission is created.
    PermissionCreated,
    /// Emitted when permission fields change.
    PermissionUpdated,
    /// Emitted when a permission is deleted.
    PermissionDeleted,
    /// Emitted when a permission is activated.
    PermissionActivated,
    /// Emitted when a permission is deactivated.
    PermissionDeactivated,
    /// Emitted when a role is assigned to an admin.
    AdminRoleAssigned,
    /// Emitted when a role is revoked from an admin.
    AdminRoleRevoked,
    /// Emitted when a permission is granted to a role.
    RolePermissionGranted,
    /// Emitted when a permission is revoked from a role.
    RolePermissionRevoked,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "rbac.role.created",
            Self::RoleUpdated => "rbac.role.updated",
            Self::RoleDeleted => "rbac.role.deleted",
            Self::RoleActivated => "rbac.role.activated",
            Self::RoleDeactivated => "rbac.role.deactivated",
            Self::PermissionCreated => "rbac.permission.created",
            Self::PermissionUpdated => "rbac.permission.updated",
            Self::PermissionDeleted => "rbac.permission.deleted",
            Self::PermissionActivated => "rbac.permission.activated",
            Self::PermissionDeactivated => "rbac.permission.deactivated",
            Self::AdminRoleAssigned => "rbac.admin_role.assigned",
            Self::AdminRoleRevoked => "rbac.admin_role.revoked",
            Self::RolePermissionGranted => "rbac.role_permission.granted",
            Self::RolePermissionRevoked => "rbac.role_permission.revoked",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;

    use super::{BuiltinPermission, EntityStatus, PermissionCode, RoleCode};

    #[test]
    fn builtin_permission_roundtrip_storage_value() {
        for permission in BuiltinPermission::all() {
            let restored = BuiltinPermission::from_str(permission.as_str());
            assert_eq!(restored.ok(), Some(*permission));
            assert!(PermissionCode::new(permission.as_str()).is_ok());
        }
    }

    #[test]
    fn unknown_builtin_permission_is_rejected() {
        assert!(BuiltinPermission::from_str("product.unknown").is_err());
    }

    #[test]
    fn status_parses_storage_values() {
        assert_eq!(EntityStatus::from_str("active").ok(), Some(EntityStatus::Active));
        assert!(EntityStatus::from_str("ACTIVE").is_err());
    }

    #[test]
    fn super_admin_code_is_recognized() {
        assert!(RoleCode::super_admin().is_super_admin());
        let editor = RoleCode::new("editor");
        assert!(editor.is_ok_and(|code| !code.is_super_admin()));
    }

    #[test]
    fn role_code_rejects_uppercase_and_leading_digit() {
        assert!(RoleCode::new("Editor").is_err());
        assert!(RoleCode::new("1editor").is_err());
        assert!(RoleCode::new("").is_err());
    }

    #[test]
    fn permission_code_rejects_empty_segments() {
        assert!(PermissionCode::new("product..edit").is_err());
        assert!(PermissionCode::new(".edit").is_err());
        assert!(PermissionCode::new("product.edit").is_ok());
    }

    proptest! {
        #[test]
        fn generated_role_codes_are_accepted(value in "[a-z][a-z0-9_]{0,63}") {
            prop_assert!(RoleCode::new(value).is_ok());
        }

        #[test]
        fn role_codes_with_separators_are_rejected(value in "[a-z]{1,10}[-. :][a-z]{1,10}") {
            prop_assert!(RoleCode::new(value).is_err());
        }

        #[test]
        fn generated_permission_codes_are_accepted(
            segments in proptest::collection::vec("[a-z0-9_]{1,12}", 1..5)
        ) {
            prop_assert!(PermissionCode::new(segments.join(".")).is_ok());
        }
    }
}
