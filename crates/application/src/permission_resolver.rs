use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{info, warn};

use vitrine_core::{AdminId, AdminPrincipal, AppError, AppResult, PermissionId, RoleId};
use vitrine_domain::{AuditAction, Permission, PermissionCode, Role};

use crate::access_ports::{AuditRecord, RbacReader};
use crate::cache_keys::{
    ALL_ADMIN_PERMISSIONS_PATTERN, ALL_ADMIN_ROLES_PATTERN, PERMISSION_LIST_KEY, ROLE_LIST_KEY,
    admin_permission_check_key, admin_permissions_key, admin_permissions_pattern,
    admin_roles_key, permission_key, role_key, role_permissions_key,
};
use crate::config::CacheTtlConfig;
use crate::transaction_coordinator::{TransactionCoordinator, TransactionScope};

mod assignments;
mod lookup;
mod permissions;
mod roles;

#[cfg(test)]
mod tests;

/// Input payload for creating a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique display name.
    pub name: String,
    /// Unique machine code.
    pub code: String,
    /// Optional description.
    pub description: Option<String>,
    /// Marks a built-in role that cannot be renamed, deleted or deactivated.
    pub is_system: bool,
}

/// Partial role update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRoleInput {
    /// New display name.
    pub name: Option<String>,
    /// New machine code.
    pub code: Option<String>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
}

/// Input payload for creating a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePermissionInput {
    /// Unique machine code.
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
}

/// Partial permission update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePermissionInput {
    /// New machine code.
    pub code: Option<String>,
    /// New human-readable name.
    pub name: Option<String>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
}

/// Resolves effective admin permissions and mutates the role graph.
///
/// Reads go through the coordinator's read-through cache. Every mutation runs
/// in a coordinated transaction that queues the invalidations it makes
/// necessary.
#[derive(Clone)]
pub struct PermissionResolver {
    coordinator: TransactionCoordinator,
    reader: Arc<dyn RbacReader>,
    cache_ttl: CacheTtlConfig,
}

impl PermissionResolver {
    /// Creates a resolver with default cache TTLs.
    #[must_use]
    pub fn new(coordinator: TransactionCoordinator, reader: Arc<dyn RbacReader>) -> Self {
        Self {
            coordinator,
            reader,
            cache_ttl: CacheTtlConfig::default(),
        }
    }

    /// Replaces the cache TTLs.
    #[must_use]
    pub fn with_cache_ttl(mut self, cache_ttl: CacheTtlConfig) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Returns the coordinator running resolver mutations.
    #[must_use]
    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }
}

fn role_not_found(role_id: RoleId) -> AppError {
    AppError::NotFound(format!("role {role_id} does not exist"))
}

fn permission_not_found(permission_id: PermissionId) -> AppError {
    AppError::NotFound(format!("permission {permission_id} does not exist"))
}

fn audit_context(scope: &TransactionScope, reason: Option<&str>) -> Value {
    let mut context = json!({ "operation": scope.operation() });
    if let (Some(reason), Some(object)) = (reason, context.as_object_mut()) {
        object.insert("reason".to_owned(), Value::String(reason.to_owned()));
    }
    context
}

fn role_audit(
    scope: &TransactionScope,
    action: AuditAction,
    actor_id: AdminId,
    role_id: RoleId,
    old_values: Option<Value>,
    new_values: Option<Value>,
) -> AuditRecord {
    AuditRecord {
        action,
        entity_type: "rbac_role".to_owned(),
        entity_id: role_id.to_string(),
        old_values,
        new_values,
        actor_id: Some(actor_id),
        context: audit_context(scope, None),
    }
}

fn permission_audit(
    scope: &TransactionScope,
    action: AuditAction,
    actor_id: AdminId,
    permission_id: PermissionId,
    old_values: Option<Value>,
    new_values: Option<Value>,
) -> AuditRecord {
    AuditRecord {
        action,
        entity_type: "rbac_permission".to_owned(),
        entity_id: permission_id.to_string(),
        old_values,
        new_values,
        actor_id: Some(actor_id),
        context: audit_context(scope, None),
    }
}
