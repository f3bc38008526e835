use super::*;

use crate::transaction_coordinator::ChunkOutcome;

impl PermissionResolver {
    /// Assigns a role to an admin.
    ///
    /// Returns `false` without writing when the admin already holds the role.
    pub async fn assign_role_to_admin(
        &self,
        actor: &AdminPrincipal,
        admin_id: AdminId,
        role_id: RoleId,
    ) -> AppResult<bool> {
        let actor_id = actor.admin_id();
        let assigned = self
            .coordinator
            .run_with_default_retry("assign_role_to_admin", move |scope| {
                Box::pin(assign_role_in_scope(scope, actor_id, admin_id, role_id))
            })
            .await?;

        if assigned {
            info!(admin_id = %admin_id, role_id = %role_id, "role assigned to admin");
        }
        Ok(assigned)
    }

    /// Revokes a role from an admin.
    ///
    /// Returns `false` without writing when the admin does not hold the role.
    pub async fn revoke_role_from_admin(
        &self,
        actor: &AdminPrincipal,
        admin_id: AdminId,
        role_id: RoleId,
        reason: Option<&str>,
    ) -> AppResult<bool> {
        let actor_id = actor.admin_id();
        let reason = reason.map(str::to_owned);
        let revoked = self
            .coordinator
            .run_with_default_retry("revoke_role_from_admin", move |scope| {
                let reason = reason.clone();
                Box::pin(async move {
                    scope
                        .store()
                        .find_admin(admin_id)
                        .await?
                        .ok_or_else(|| admin_not_found(admin_id))?;
                    let role = scope
                        .store()
                        .find_role(role_id)
                        .await?
                        .ok_or_else(|| role_not_found(role_id))?;

                    if !scope.store().admin_has_role(admin_id, role_id).await? {
                        return Ok(false);
                    }

                    let before = role_codes(scope.store().list_admin_roles(admin_id).await?);
                    scope.store().delete_admin_role(admin_id, role_id).await?;
                    let after: Vec<String> = before
                        .iter()
                        .filter(|code| code.as_str() != role.code.as_str())
                        .cloned()
                        .collect();

                    queue_admin_invalidations(scope, admin_id)?;
                    let mut context = audit_context(scope, reason.as_deref());
                    if let Some(object) = context.as_object_mut() {
                        object.insert("role_code".to_owned(), json!(role.code.as_str()));
                    }
                    scope.record_audit(AuditRecord {
                        action: AuditAction::AdminRoleRevoked,
                        entity_type: "admin_account".to_owned(),
                        entity_id: admin_id.to_string(),
                        old_values: Some(json!({ "roles": before })),
                        new_values: Some(json!({ "roles": after })),
                        actor_id: Some(actor_id),
                        context,
                    });

                    Ok(true)
                })
            })
            .await?;

        if revoked {
            info!(admin_id = %admin_id, role_id = %role_id, "role revoked from admin");
        }
        Ok(revoked)
    }

    /// Assigns one role to many admins, one transaction per chunk.
    ///
    /// Chunks that fail roll back alone; the outcomes report which admins in
    /// each chunk received the role.
    pub async fn bulk_assign_role(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
        admin_ids: Vec<AdminId>,
    ) -> AppResult<Vec<ChunkOutcome<bool>>> {
        let actor_id = actor.admin_id();
        self.coordinator
            .batch(
                "bulk_assign_role",
                admin_ids,
                move |scope, admin_id| {
                    Box::pin(assign_role_in_scope(scope, actor_id, admin_id, role_id))
                },
                self.coordinator.config().batch_size,
            )
            .await
    }

    /// Grants a permission to a role.
    ///
    /// Every admin permission cache is invalidated since the set of admins
    /// holding the role is not enumerated.
    pub async fn assign_permission_to_role(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        let actor_id = actor.admin_id();
        self.coordinator
            .run_with_default_retry("assign_permission_to_role", move |scope| {
                Box::pin(async move {
                    let (role, permission) =
                        load_role_and_permission(scope, role_id, permission_id).await?;
                    if scope
                        .store()
                        .role_has_permission(role_id, permission_id)
                        .await?
                    {
                        return Ok(false);
                    }

                    scope
                        .store()
                        .insert_role_permission(role_id, permission_id)
                        .await?;
                    queue_role_grant_invalidations(scope, role_id)?;
                    let audit = role_permission_audit(
                        scope,
                        AuditAction::RolePermissionGranted,
                        actor_id,
                        &role,
                        &permission,
                    );
                    scope.record_audit(audit);

                    Ok(true)
                })
            })
            .await
    }

    /// Revokes a permission from a role.
    pub async fn revoke_permission_from_role(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        let actor_id = actor.admin_id();
        self.coordinator
            .run_with_default_retry("revoke_permission_from_role", move |scope| {
                Box::pin(async move {
                    let (role, permission) =
                        load_role_and_permission(scope, role_id, permission_id).await?;
                    if !scope
                        .store()
                        .role_has_permission(role_id, permission_id)
                        .await?
                    {
                        return Ok(false);
                    }

                    scope
                        .store()
                        .delete_role_permission(role_id, permission_id)
                        .await?;
                    queue_role_grant_invalidations(scope, role_id)?;
                    let audit = role_permission_audit(
                        scope,
                        AuditAction::RolePermissionRevoked,
                        actor_id,
                        &role,
                        &permission,
                    );
                    scope.record_audit(audit);

                    Ok(true)
                })
            })
            .await
    }
}

async fn assign_role_in_scope(
    scope: &mut TransactionScope,
    actor_id: AdminId,
    admin_id: AdminId,
    role_id: RoleId,
) -> AppResult<bool> {
    scope
        .store()
        .find_admin(admin_id)
        .await?
        .ok_or_else(|| admin_not_found(admin_id))?;
    let role = scope
        .store()
        .find_role(role_id)
        .await?
        .ok_or_else(|| role_not_found(role_id))?;

    if scope.store().admin_has_role(admin_id, role_id).await? {
        return Ok(false);
    }

    let before = role_codes(scope.store().list_admin_roles(admin_id).await?);
    scope.store().insert_admin_role(admin_id, role_id).await?;
    let mut after = before.clone();
    after.push(role.code.to_string());
    after.sort();

    queue_admin_invalidations(scope, admin_id)?;
    let mut context = audit_context(scope, None);
    if let Some(object) = context.as_object_mut() {
        object.insert("role_code".to_owned(), json!(role.code.as_str()));
    }
    scope.record_audit(AuditRecord {
        action: AuditAction::AdminRoleAssigned,
        entity_type: "admin_account".to_owned(),
        entity_id: admin_id.to_string(),
        old_values: Some(json!({ "roles": before })),
        new_values: Some(json!({ "roles": after })),
        actor_id: Some(actor_id),
        context,
    });

    Ok(true)
}

async fn load_role_and_permission(
    scope: &mut TransactionScope,
    role_id: RoleId,
    permission_id: PermissionId,
) -> AppResult<(Role, Permission)> {
    let role = scope
        .store()
        .find_role(role_id)
        .await?
        .ok_or_else(|| role_not_found(role_id))?;
    let permission = scope
        .store()
        .find_permission(permission_id)
        .await?
        .ok_or_else(|| permission_not_found(permission_id))?;

    Ok((role, permission))
}

fn queue_admin_invalidations(scope: &mut TransactionScope, admin_id: AdminId) -> AppResult<()> {
    scope.invalidate_pattern(admin_permissions_pattern(admin_id))?;
    scope.invalidate_key(admin_roles_key(admin_id))
}

fn queue_role_grant_invalidations(scope: &mut TransactionScope, role_id: RoleId) -> AppResult<()> {
    scope.invalidate_key(role_key(role_id))?;
    scope.invalidate_key(role_permissions_key(role_id))?;
    scope.invalidate_pattern(ALL_ADMIN_PERMISSIONS_PATTERN)
}

fn role_permission_audit(
    scope: &TransactionScope,
    action: AuditAction,
    actor_id: AdminId,
    role: &Role,
    permission: &Permission,
) -> AuditRecord {
    let granted = action == AuditAction::RolePermissionGranted;
    let edge = json!({ "role_id": role.id, "permission_code": permission.code.as_str() });
    let (old_values, new_values) = if granted {
        (None, Some(edge))
    } else {
        (Some(edge), None)
    };

    let mut record = role_audit(scope, action, actor_id, role.id, old_values, new_values);
    record.entity_type = "rbac_role_permission".to_owned();
    record.entity_id = format!("{}:{}", role.id, permission.id);
    record
}

fn admin_not_found(admin_id: AdminId) -> AppError {
    AppError::NotFound(format!("admin {admin_id} does not exist"))
}

fn role_codes(roles: Vec<Role>) -> Vec<String> {
    let mut codes: Vec<String> = roles.into_iter().map(|role| role.code.into()).collect();
    codes.sort();
    codes
}
