//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod admin;
mod permission;
mod role;
mod security;

pub use admin::AdminAccount;
pub use permission::{NewPermission, Permission, PermissionChanges};
pub use role::{NewRole, Role, RoleChanges};
pub use security::{
    AuditAction, BuiltinPermission, EntityStatus, PermissionCode, RoleCode, SUPER_ADMIN_ROLE_CODE,
};
