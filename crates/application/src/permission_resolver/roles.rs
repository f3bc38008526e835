use super::*;

use chrono::Utc;
use vitrine_domain::{EntityStatus, NewRole, RoleChanges, RoleCode};

impl PermissionResolver {
    /// Creates a role after checking name and code uniqueness.
    pub async fn create_role(
        &self,
        actor: &AdminPrincipal,
        input: CreateRoleInput,
    ) -> AppResult<Role> {
        let new_role = NewRole::new(input.name, input.code, input.description, input.is_system)?;
        let actor_id = actor.admin_id();

        let role = self
            .coordinator
            .run_with_default_retry("create_role", move |scope| {
                let new_role = new_role.clone();
                Box::pin(async move {
                    ensure_role_name_available(scope, new_role.name.as_str(), None).await?;
                    ensure_role_code_available(scope, &new_role.code, None).await?;

                    let role = scope.store().insert_role(new_role).await?;
                    scope.invalidate_key(ROLE_LIST_KEY)?;
                    let audit = role_audit(
                        scope,
                        AuditAction::RoleCreated,
                        actor_id,
                        role.id,
                        None,
                        Some(role.audit_value()),
                    );
                    scope.record_audit(audit);

                    Ok(role)
                })
            })
            .await?;

        info!(role_id = %role.id, code = %role.code, "role created");
        Ok(role)
    }

    /// Applies a partial update to a role.
    ///
    /// System roles reject every update. An update matching the stored values
    /// of another role is a no-op that writes nothing.
    pub async fn update_role(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
        input: UpdateRoleInput,
    ) -> AppResult<Role> {
        let changes = RoleChanges::new(input.name, input.code, input.description)?;
        if changes.is_empty() {
            return Err(AppError::validation(
                "input",
                "at least one role field must be provided",
            ));
        }
        let actor_id = actor.admin_id();

        self.coordinator
            .run_with_default_retry("update_role", move |scope| {
                let changes = changes.clone();
                Box::pin(async move {
                    let mut role = find_role(scope, role_id).await?;
                    let before = role.audit_value();
                    if !role.apply_changes(&changes, Utc::now())? {
                        return Ok(role);
                    }

                    if let Some(name) = &changes.name {
                        ensure_role_name_available(scope, name.as_str(), Some(role_id)).await?;
                    }
                    if let Some(code) = &changes.code {
                        ensure_role_code_available(scope, code, Some(role_id)).await?;
                    }

                    scope.store().update_role(&role).await?;
                    queue_role_entity_invalidations(scope, role_id)?;
                    let audit = role_audit(
                        scope,
                        AuditAction::RoleUpdated,
                        actor_id,
                        role_id,
                        Some(before),
                        Some(role.audit_value()),
                    );
                    scope.record_audit(audit);

                    Ok(role)
                })
            })
            .await
    }

    /// Deletes a role that is not a system role and has no admin holders.
    pub async fn delete_role(&self, actor: &AdminPrincipal, role_id: RoleId) -> AppResult<()> {
        let actor_id = actor.admin_id();

        self.coordinator
            .run_with_default_retry("delete_role", move |scope| {
                Box::pin(async move {
                    let role = find_role(scope, role_id).await?;
                    role.ensure_deletable()?;

                    let holders = scope.store().count_role_admins(role_id).await?;
                    if holders > 0 {
                        return Err(AppError::Constraint(format!(
                            "role '{}' is assigned to {holders} admin(s)",
                            role.code
                        )));
                    }

                    scope.store().delete_role(role_id).await?;
                    scope.invalidate_key(role_key(role_id))?;
                    scope.invalidate_key(role_permissions_key(role_id))?;
                    scope.invalidate_key(ROLE_LIST_KEY)?;
                    let audit = role_audit(
                        scope,
                        AuditAction::RoleDeleted,
                        actor_id,
                        role_id,
                        Some(role.audit_value()),
                        None,
                    );
                    scope.record_audit(audit);

                    Ok(())
                })
            })
            .await?;

        info!(role_id = %role_id, "role deleted");
        Ok(())
    }

    /// Activates an inactive role.
    pub async fn activate_role(&self, actor: &AdminPrincipal, role_id: RoleId) -> AppResult<Role> {
        self.set_role_status(actor, role_id, EntityStatus::Active)
            .await
    }

    /// Deactivates an active non-system role.
    pub async fn deactivate_role(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
    ) -> AppResult<Role> {
        self.set_role_status(actor, role_id, EntityStatus::Inactive)
            .await
    }

    async fn set_role_status(
        &self,
        actor: &AdminPrincipal,
        role_id: RoleId,
        status: EntityStatus,
    ) -> AppResult<Role> {
        let actor_id = actor.admin_id();
        let (operation_name, action) = match status {
            EntityStatus::Active => ("activate_role", AuditAction::RoleActivated),
            EntityStatus::Inactive => ("deactivate_role", AuditAction::RoleDeactivated),
        };

        self.coordinator
            .run_with_default_retry(operation_name, move |scope| {
                Box::pin(async move {
                    let mut role = find_role(scope, role_id).await?;
                    match status {
                        EntityStatus::Active => role.ensure_activatable()?,
                        EntityStatus::Inactive => role.ensure_deactivatable()?,
                    }

                    let before = role.audit_value();
                    role.status = status;
                    role.updated_at = Utc::now();
                    scope.store().update_role(&role).await?;
                    queue_role_entity_invalidations(scope, role_id)?;
                    let audit = role_audit(
                        scope,
                        action,
                        actor_id,
                        role_id,
                        Some(before),
                        Some(role.audit_value()),
                    );
                    scope.record_audit(audit);

                    Ok(role)
                })
            })
            .await
    }
}

async fn find_role(scope: &mut TransactionScope, role_id: RoleId) -> AppResult<Role> {
    scope
        .store()
        .find_role(role_id)
        .await?
        .ok_or_else(|| role_not_found(role_id))
}

async fn ensure_role_name_available(
    scope: &mut TransactionScope,
    name: &str,
    current: Option<RoleId>,
) -> AppResult<()> {
    match scope.store().find_role_by_name(name).await? {
        Some(existing) if Some(existing.id) != current => Err(AppError::Constraint(format!(
            "role name '{name}' is already in use"
        ))),
        _ => Ok(()),
    }
}

async fn ensure_role_code_available(
    scope: &mut TransactionScope,
    code: &RoleCode,
    current: Option<RoleId>,
) -> AppResult<()> {
    match scope.store().find_role_by_code(code).await? {
        Some(existing) if Some(existing.id) != current => Err(AppError::Constraint(format!(
            "role code '{code}' is already in use"
        ))),
        _ => Ok(()),
    }
}

fn queue_role_entity_invalidations(scope: &mut TransactionScope, role_id: RoleId) -> AppResult<()> {
    scope.invalidate_key(role_key(role_id))?;
    scope.invalidate_key(ROLE_LIST_KEY)?;
    scope.invalidate_pattern(ALL_ADMIN_ROLES_PATTERN)?;
    scope.invalidate_pattern(ALL_ADMIN_PERMISSIONS_PATTERN)
}
