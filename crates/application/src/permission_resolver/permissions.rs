use super::*;

use chrono::Utc;
use vitrine_domain::{EntityStatus, NewPermission, PermissionChanges};

use crate::cache_keys::ALL_ROLE_PERMISSIONS_PATTERN;

impl PermissionResolver {
    /// Creates a permission after checking code uniqueness.
    pub async fn create_permission(
        &self,
        actor: &AdminPrincipal,
        input: CreatePermissionInput,
    ) -> AppResult<Permission> {
        let new_permission = NewPermission::new(input.code, input.name, input.description)?;
        let actor_id = actor.admin_id();

        let permission = self
            .coordinator
            .run_with_default_retry("create_permission", move |scope| {
                let new_permission = new_permission.clone();
                Box::pin(async move {
                    ensure_permission_code_available(scope, &new_permission.code, None).await?;

                    let permission = scope.store().insert_permission(new_permission).await?;
                    scope.invalidate_key(PERMISSION_LIST_KEY)?;
                    let audit = permission_audit(
                        scope,
                        AuditAction::PermissionCreated,
                        actor_id,
                        permission.id,
                        None,
                        Some(permission.audit_value()),
                    );
                    scope.record_audit(audit);

                    Ok(permission)
                })
            })
            .await?;

        info!(
            permission_id = %permission.id,
            code = %permission.code,
            "permission created"
        );
        Ok(permission)
    }

    /// Applies a partial update to a permission.
    ///
    /// A code change invalidates every cached admin permission set.
    pub async fn update_permission(
        &self,
        actor: &AdminPrincipal,
        permission_id: PermissionId,
        input: UpdatePermissionInput,
    ) -> AppResult<Permission> {
        let changes = PermissionChanges::new(input.code, input.name, input.description)?;
        if changes.code.is_none() && changes.name.is_none() && changes.description.is_none() {
            return Err(AppError::validation(
                "input",
                "at least one permission field must be provided",
            ));
        }
        let actor_id = actor.admin_id();

        self.coordinator
            .run_with_default_retry("update_permission", move |scope| {
                let changes = changes.clone();
                Box::pin(async move {
                    let mut permission = find_permission(scope, permission_id).await?;
                    let before = permission.audit_value();
                    if !permission.apply_changes(&changes, Utc::now()) {
                        return Ok(permission);
                    }

                    if let Some(code) = &changes.code {
                        ensure_permission_code_available(scope, code, Some(permission_id))
                            .await?;
                    }

                    scope.store().update_permission(&permission).await?;
                    queue_permission_entity_invalidations(scope, permission_id)?;
                    let audit = permission_audit(
                        scope,
                        AuditAction::PermissionUpdated,
                        actor_id,
                        permission_id,
                        Some(before),
                        Some(permission.audit_value()),
                    );
                    scope.record_audit(audit);

                    Ok(permission)
                })
            })
            .await
    }

    /// Deletes a permission no role grants.
    pub async fn delete_permission(
        &self,
        actor: &AdminPrincipal,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        let actor_id = actor.admin_id();

        self.coordinator
            .run_with_default_retry("delete_permission", move |scope| {
                Box::pin(async move {
                    let permission = find_permission(scope, permission_id).await?;

                    let granting_roles = scope.store().count_permission_roles(permission_id).await?;
                    if granting_roles > 0 {
                        return Err(AppError::Constraint(format!(
                            "permission '{}' is granted by {granting_roles} role(s)",
                            permission.code
                        )));
                    }

                    scope.store().delete_permission(permission_id).await?;
                    scope.invalidate_key(permission_key(permission_id))?;
                    scope.invalidate_key(PERMISSION_LIST_KEY)?;
                    let audit = permission_audit(
                        scope,
                        AuditAction::PermissionDeleted,
                        actor_id,
                        permission_id,
                        Some(permission.audit_value()),
                        None,
                    );
                    scope.record_audit(audit);

                    Ok(())
                })
            })
            .await?;

        info!(permission_id = %permission_id, "permission deleted");
        Ok(())
    }

    /// Activates an inactive permission.
    pub async fn activate_permission(
        &self,
        actor: &AdminPrincipal,
        permission_id: PermissionId,
    ) -> AppResult<Permission> {
        self.set_permission_status(actor, permission_id, EntityStatus::Active)
            .await
    }

    /// Deactivates an active permission.
    pub async fn deactivate_permission(
        &self,
        actor: &AdminPrincipal,
        permission_id: PermissionId,
    ) -> AppResult<Permission> {
        self.set_permission_status(actor, permission_id, EntityStatus::Inactive)
            .await
    }

    async fn set_permission_status(
        &self,
        actor: &AdminPrincipal,
        permission_id: PermissionId,
        status: EntityStatus,
    ) -> AppResult<Permission> {
        let actor_id = actor.admin_id();
        let (operation_name, action) = match status {
            EntityStatus::Active => ("activate_permission", AuditAction::PermissionActivated),
            EntityStatus::Inactive => (
                "deactivate_permission",
                AuditAction::PermissionDeactivated,
            ),
        };

        self.coordinator
            .run_with_default_retry(operation_name, move |scope| {
                Box::pin(async move {
                    let mut permission = find_permission(scope, permission_id).await?;
                    match status {
                        EntityStatus::Active => permission.ensure_activatable()?,
                        EntityStatus::Inactive => permission.ensure_deactivatable()?,
                    }

                    let before = permission.audit_value();
                    permission.status = status;
                    permission.updated_at = Utc::now();
                    scope.store().update_permission(&permission).await?;
                    queue_permission_entity_invalidations(scope, permission_id)?;
                    let audit = permission_audit(
                        scope,
                        action,
                        actor_id,
                        permission_id,
                        Some(before),
                        Some(permission.audit_value()),
                    );
                    scope.record_audit(audit);

                    Ok(permission)
                })
            })
            .await
    }
}

async fn find_permission(
    scope: &mut TransactionScope,
    permission_id: PermissionId,
) -> AppResult<Permission> {
    scope
        .store()
        .find_permission(permission_id)
        .await?
        .ok_or_else(|| permission_not_found(permission_id))
}

async fn ensure_permission_code_available(
    scope: &mut TransactionScope,
    code: &PermissionCode,
    current: Option<PermissionId>,
) -> AppResult<()> {
    match scope.store().find_permission_by_code(code).await? {
        Some(existing) if Some(existing.id) != current => Err(AppError::Constraint(format!(
            "permission code '{code}' is already in use"
        ))),
        _ => Ok(()),
    }
}

fn queue_permission_entity_invalidations(
    scope: &mut TransactionScope,
    permission_id: PermissionId,
) -> AppResult<()> {
    scope.invalidate_key(permission_key(permission_id))?;
    scope.invalidate_key(PERMISSION_LIST_KEY)?;
    scope.invalidate_pattern(ALL_ROLE_PERMISSIONS_PATTERN)?;
    scope.invalidate_pattern(ALL_ADMIN_PERMISSIONS_PATTERN)
}
