use vitrine_core::{AdminId, AdminPrincipal, AppError, AppResult, PermissionId, RoleId};
use vitrine_domain::{BuiltinPermission, Permission, PermissionCode, Role};

use crate::permission_resolver::{
    CreatePermissionInput, CreateRoleInput, PermissionResolver, UpdatePermissionInput,
    UpdateRoleInput,
};
use crate::transaction_coordinator::ChunkOutcome;

/// Application service for role and permission administration.
///
/// Every method checks the actor's permission before delegating to the
/// resolver.
#[derive(Clone)]
pub struct AccessAdminService {
    resolver: PermissionResolver,
}

impl AccessAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(resolver: PermissionResolver) -> Self {
        Self { resolver }
    }

    /// Lists every role.
    pub async fn list_roles(&self, actor: &AdminPrincipal) -> AppResult<Vec<Role>> {
        self.require_role_manage_permission(actor).await?;
        self.resolver.roles().await
    }

    /// Returns one role with the permissions it grants.
    pub async fn role_with_permissions(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
    ) -> AppResult<(Role, Vec<Permission>)> {
        self.require_role_manage_permission(actor).await?;
        let role = self.resolver.role(role_id).await?;
        let permissions = self.resolver.role_permissions(role_id).await?;
        Ok((role, permissions))
    }

    /// Returns the effective permission codes of one admin.
    pub async fn admin_permissions(
        &self,
        actor: &AdminPrincipal,
        admin_id: AdminId,
    ) -> AppResult<Vec<PermissionCode>> {
        self.require_role_manage_permission(actor).await?;
        self.resolver.effective_permissions(admin_id).await
    }

    /// Creates a role. Only the system principal may create system roles.
    pub async fn create_role(
        &self,
        actor: &AdminPrincipal,
        input: CreateRoleInput,
    ) -> AppResult<Role> {
        self.require_role_manage_permission(actor).await?;
        if input.is_system && !actor.is_system() {
            return Err(AppError::Unauthorized(format!(
                "admin '{}' cannot create system roles",
                actor.username()
            )));
        }

        self.resolver.create_role(actor, input).await
    }

    /// Updates a role.
    pub async fn update_role(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
        input: UpdateRoleInput,
    ) -> AppResult<Role> {
        self.require_role_manage_permission(actor).await?;
        self.resolver.update_role(actor, role_id, input).await
    }

    /// Deletes a role.
    pub async fn delete_role(&self, actor: &AdminPrincipal, role_id: RoleId) -> AppResult<()> {
        self.require_role_manage_permission(actor).await?;
        self.resolver.delete_role(actor, role_id).await
    }

    /// Activates a role.
    pub async fn activate_role(&self, actor: &AdminPrincipal, role_id: RoleId) -> AppResult<Role> {
        self.require_role_manage_permission(actor).await?;
        self.resolver.activate_role(actor, role_id).await
    }

    /// Deactivates a role.
    pub async fn deactivate_role(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
    ) -> AppResult<Role> {
        self.require_role_manage_permission(actor).await?;
        self.resolver.deactivate_role(actor, role_id).await
    }

    /// Assigns a role to an admin.
    pub async fn assign_role(
        &self,
        actor: &AdminPrincipal,
        admin_id: AdminId,
        role_id: RoleId,
    ) -> AppResult<bool> {
        self.require_role_manage_permission(actor).await?;
        self.resolver
            .assign_role_to_admin(actor, admin_id, role_id)
            .await
    }

    /// Revokes a role from an admin.
    pub async fn revoke_role(
        &self,
        actor: &AdminPrincipal,
        admin_id: AdminId,
        role_id: RoleId,
        reason: Option<&str>,
    ) -> AppResult<bool> {
        self.require_role_manage_permission(actor).await?;
        self.resolver
            .revoke_role_from_admin(actor, admin_id, role_id, reason)
            .await
    }

    /// Assigns a role to many admins in chunked transactions.
    pub async fn bulk_assign_role(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
        admin_ids: Vec<AdminId>,
    ) -> AppResult<Vec<ChunkOutcome<bool>>> {
        self.require_role_manage_permission(actor).await?;
        self.resolver
            .bulk_assign_role(actor, role_id, admin_ids)
            .await
    }

    /// Lists every permission.
    pub async fn list_permissions(&self, actor: &AdminPrincipal) -> AppResult<Vec<Permission>> {
        self.require_permission_manage_permission(actor).await?;
        self.resolver.permissions().await
    }

    /// Creates a permission.
    pub async fn create_permission(
        &self,
        actor: &AdminPrincipal,
        input: CreatePermissionInput,
    ) -> AppResult<Permission> {
        self.require_permission_manage_permission(actor).await?;
        self.resolver.create_permission(actor, input).await
    }

    /// Updates a permission.
    pub async fn update_permission(
        &self,
        actor: &AdminPrincipal,
        permission_id: PermissionId,
        input: UpdatePermissionInput,
    ) -> AppResult<Permission> {
        self.require_permission_manage_permission(actor).await?;
        self.resolver
            .update_permission(actor, permission_id, input)
            .await
    }

    /// Deletes a permission.
    pub async fn delete_permission(
        &self,
        actor: &AdminPrincipal,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.require_permission_manage_permission(actor).await?;
        self.resolver.delete_permission(actor, permission_id).await
    }

    /// Activates a permission.
    pub async fn activate_permission(
        &self,
        actor: &AdminPrincipal,
        permission_id: PermissionId,
    ) -> AppResult<Permission> {
        self.require_permission_manage_permission(actor).await?;
        self.resolver.activate_permission(actor, permission_id).await
    }

    /// Deactivates a permission.
    pub async fn deactivate_permission(
        &self,
        actor: &AdminPrincipal,
        permission_id: PermissionId,
    ) -> AppResult<Permission> {
        self.require_permission_manage_permission(actor).await?;
        self.resolver
            .deactivate_permission(actor, permission_id)
            .await
    }

    /// Grants a permission to a role.
    pub async fn grant_permission(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        self.require_permission_manage_permission(actor).await?;
        self.resolver
            .assign_permission_to_role(actor, role_id, permission_id)
            .await
    }

    /// Revokes a permission from a role.
    pub async fn revoke_permission(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        self.require_permission_manage_permission(actor).await?;
        self.resolver
            .revoke_permission_from_role(actor, role_id, permission_id)
            .await
    }

    async fn require_role_manage_permission(&self, actor: &AdminPrincipal) -> AppResult<()> {
        self.resolver
            .authorize(
                Some(actor),
                BuiltinPermission::RbacRoleManage.as_str(),
                Some("rbac_role"),
            )
            .await
    }

    async fn require_permission_manage_permission(&self, actor: &AdminPrincipal) -> AppResult<()> {
        self.resolver
            .authorize(
                Some(actor),
                BuiltinPermission::RbacPermissionManage.as_str(),
                Some("rbac_permission"),
            )
            .await
    }
}
