use async_trait::async_trait;

use vitrine_core::{AdminId, AppResult, PermissionId, RoleId};
use vitrine_domain::{
    AdminAccount, NewPermission, NewRole, Permission, PermissionCode, Role, RoleCode,
};

/// Result of probing an open transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Every statement so far succeeded.
    Active,
    /// A statement failed; the transaction can only be rolled back.
    Failed,
}

/// Relational store that hands out transactions.
#[async_trait]
pub trait TransactionalDataStore: Send + Sync {
    /// Begins a new transaction.
    async fn begin(&self) -> AppResult<Box<dyn DataStoreTransaction>>;
}

/// Read-only queries executed outside any transaction.
#[async_trait]
pub trait RbacReader: Send + Sync {
    /// Finds one role.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Lists every role ordered by name.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Finds one permission.
    async fn find_permission(&self, permission_id: PermissionId) -> AppResult<Option<Permission>>;

    /// Lists every permission ordered by code.
    async fn list_permissions(&self) -> AppResult<Vec<Permission>>;

    /// Lists permissions attached to one role, regardless of status.
    async fn list_role_permissions(&self, role_id: RoleId) -> AppResult<Vec<Permission>>;

    /// Lists roles assigned to one admin, regardless of status.
    async fn list_admin_roles(&self, admin_id: AdminId) -> AppResult<Vec<Role>>;
}

/// Open transaction exposing the queries mutations need.
///
/// Implementations move to [`TransactionStatus::Failed`] whenever a statement
/// fails, even if the caller discards the error.
#[async_trait]
pub trait DataStoreTransaction: Send {
    /// Returns the current transaction status.
    fn status(&self) -> TransactionStatus;

    /// Commits the transaction.
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// Rolls the transaction back.
    async fn rollback(self: Box<Self>) -> AppResult<()>;

    /// Finds one admin account.
    async fn find_admin(&mut self, admin_id: AdminId) -> AppResult<Option<AdminAccount>>;

    /// Finds one role.
    async fn find_role(&mut self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Finds a role by its unique name.
    async fn find_role_by_name(&mut self, name: &str) -> AppResult<Option<Role>>;

    /// Finds a role by its unique code.
    async fn find_role_by_code(&mut self, code: &RoleCode) -> AppResult<Option<Role>>;

    /// Finds one permission.
    async fn find_permission(
        &mut self,
        permission_id: PermissionId,
    ) -> AppResult<Option<Permission>>;

    /// Finds a permission by its unique code.
    async fn find_permission_by_code(
        &mut self,
        code: &PermissionCode,
    ) -> AppResult<Option<Permission>>;

    /// Lists roles assigned to one admin.
    async fn list_admin_roles(&mut self, admin_id: AdminId) -> AppResult<Vec<Role>>;

    /// Returns whether the admin holds the role.
    async fn admin_has_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<bool>;

    /// Returns whether the role grants the permission.
    async fn role_has_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool>;

    /// Counts admins holding the role.
    async fn count_role_admins(&mut self, role_id: RoleId) -> AppResult<u64>;

    /// Counts roles granting the permission.
    async fn count_permission_roles(&mut self, permission_id: PermissionId) -> AppResult<u64>;

    /// Inserts a role and returns the stored row.
    async fn insert_role(&mut self, role: NewRole) -> AppResult<Role>;

    /// Persists mutable role fields.
    async fn update_role(&mut self, role: &Role) -> AppResult<()>;

    /// Deletes a role and its permission edges.
    async fn delete_role(&mut self, role_id: RoleId) -> AppResult<()>;

    /// Inserts a permission and returns the stored row.
    async fn insert_permission(&mut self, permission: NewPermission) -> AppResult<Permission>;

    /// Persists mutable permission fields.
    async fn update_permission(&mut self, permission: &Permission) -> AppResult<()>;

    /// Deletes a permission.
    async fn delete_permission(&mut self, permission_id: PermissionId) -> AppResult<()>;

    /// Inserts an admin-to-role edge.
    async fn insert_admin_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<()>;

    /// Deletes an admin-to-role edge.
    async fn delete_admin_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<()>;

    /// Inserts a role-to-permission edge.
    async fn insert_role_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()>;

    /// Deletes a role-to-permission edge.
    async fn delete_role_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()>;
}
