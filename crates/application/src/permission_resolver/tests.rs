use std::sync::Arc;

use vitrine_core::{AdminId, AdminPrincipal, AppError, PermissionId, RoleId};
use vitrine_domain::{AuditAction, EntityStatus, PermissionCode};

use crate::test_support::Harness;

use super::{
    CreatePermissionInput, CreateRoleInput, PermissionResolver, UpdatePermissionInput,
    UpdateRoleInput,
};

struct Fixture {
    harness: Harness,
    resolver: PermissionResolver,
    actor: AdminPrincipal,
}

fn fixture() -> Fixture {
    let harness = Harness::new();
    let resolver = PermissionResolver::new(harness.coordinator.clone(), harness.store.clone());

    Fixture {
        harness,
        resolver,
        actor: AdminPrincipal::new(AdminId::new(1), "root"),
    }
}

fn code(value: &str) -> PermissionCode {
    let Ok(code) = PermissionCode::new(value) else {
        panic!("permission code '{value}' should validate");
    };
    code
}

#[tokio::test]
async fn editor_loses_permission_after_revoke_from_role() {
    let fixture = fixture();
    let admin_id = fixture.harness.store.state.lock().await.add_admin(42, "alice");

    let Ok(role) = fixture
        .resolver
        .create_role(
            &fixture.actor,
            CreateRoleInput {
                name: "Editor".to_owned(),
                code: "editor".to_owned(),
                description: None,
                is_system: false,
            },
        )
        .await
    else {
        panic!("role should be created");
    };
    let Ok(permission) = fixture
        .resolver
        .create_permission(
            &fixture.actor,
            CreatePermissionInput {
                code: "product.edit".to_owned(),
                name: "Edit products".to_owned(),
                description: None,
            },
        )
        .await
    else {
        panic!("permission should be created");
    };

    let granted = fixture
        .resolver
        .assign_permission_to_role(&fixture.actor, role.id, permission.id)
        .await;
    assert!(matches!(granted, Ok(true)));
    let assigned = fixture
        .resolver
        .assign_role_to_admin(&fixture.actor, admin_id, role.id)
        .await;
    assert!(matches!(assigned, Ok(true)));

    let allowed = fixture
        .resolver
        .has_permission(admin_id, "product.edit")
        .await;
    assert!(matches!(allowed, Ok(true)));
    assert!(
        fixture
            .harness
            .cache
            .contains("admin:42:permissions:product.edit")
            .await
    );

    let revoked = fixture
        .resolver
        .revoke_permission_from_role(&fixture.actor, role.id, permission.id)
        .await;
    assert!(matches!(revoked, Ok(true)));

    let allowed = fixture
        .resolver
        .has_permission(admin_id, "product.edit")
        .await;
    assert!(matches!(allowed, Ok(false)));
}

#[tokio::test]
async fn role_assignment_is_idempotent() {
    let fixture = fixture();
    let (admin_id, role_id) = {
        let mut state = fixture.harness.store.state.lock().await;
        (state.add_admin(7, "bob"), state.add_role("editor", false))
    };

    let first = fixture
        .resolver
        .assign_role_to_admin(&fixture.actor, admin_id, role_id)
        .await;
    let second = fixture
        .resolver
        .assign_role_to_admin(&fixture.actor, admin_id, role_id)
        .await;
    assert!(matches!(first, Ok(true)));
    assert!(matches!(second, Ok(false)));

    let first = fixture
        .resolver
        .revoke_role_from_admin(&fixture.actor, admin_id, role_id, Some("rotation"))
        .await;
    let second = fixture
        .resolver
        .revoke_role_from_admin(&fixture.actor, admin_id, role_id, None)
        .await;
    assert!(matches!(first, Ok(true)));
    assert!(matches!(second, Ok(false)));

    let records = fixture.harness.audit.records.lock().await;
    let actions: Vec<AuditAction> = records.iter().map(|record| record.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::AdminRoleAssigned, AuditAction::AdminRoleRevoked]
    );
    assert_eq!(records[1].context["reason"], "rotation");
    assert_eq!(records[1].old_values, Some(serde_json::json!({ "roles": ["editor"] })));
    assert_eq!(
        records[1].new_values,
        Some(serde_json::json!({ "roles": Vec::<String>::new() }))
    );
}

#[tokio::test]
async fn assignment_requires_existing_admin_and_role() {
    let fixture = fixture();
    let role_id = fixture
        .harness
        .store
        .state
        .lock()
        .await
        .add_role("editor", false);
    fixture.harness.store.state.lock().await.add_admin(3, "carol");

    let missing_admin = fixture
        .resolver
        .assign_role_to_admin(&fixture.actor, AdminId::new(99), role_id)
        .await;
    let missing_role = fixture
        .resolver
        .assign_role_to_admin(&fixture.actor, AdminId::new(3), RoleId::new(99))
        .await;

    assert!(matches!(missing_admin, Err(AppError::NotFound(_))));
    assert!(matches!(missing_role, Err(AppError::NotFound(_))));
    assert!(fixture.harness.store.snapshot().await.admin_roles.is_empty());
}

#[tokio::test]
async fn super_admin_bypasses_permission_caches() {
    let fixture = fixture();
    let admin_id = {
        let mut state = fixture.harness.store.state.lock().await;
        let admin_id = state.add_admin(5, "root");
        let role_id = state.add_role("super_admin", true);
        state.assign(admin_id, role_id);
        admin_id
    };

    let allowed = fixture
        .resolver
        .has_permission(admin_id, "audit.log.read")
        .await;

    assert!(matches!(allowed, Ok(true)));
    assert!(fixture.harness.cache.contains("admin:5:roles").await);
    assert!(
        !fixture
            .harness
            .cache
            .contains("admin:5:permissions:audit.log.read")
            .await
    );
    assert!(!fixture.harness.cache.contains("admin:5:permissions").await);
}

#[tokio::test]
async fn inactive_roles_and_permissions_grant_nothing() {
    let fixture = fixture();
    let (admin_id, editor_id) = {
        let mut state = fixture.harness.store.state.lock().await;
        let admin_id = state.add_admin(8, "dave");
        let editor_id = state.add_role("editor", false);
        let viewer_id = state.add_role("viewer", false);
        let edit = state.add_permission("product.edit");
        let view = state.add_permission("product.view");
        let delete = state.add_permission("product.delete");
        state.grant(editor_id, edit);
        state.grant(editor_id, view);
        state.grant(viewer_id, view);
        state.grant(viewer_id, delete);
        state.assign(admin_id, editor_id);
        state.assign(admin_id, viewer_id);
        if let Some(permission) = state.permissions.get_mut(&delete) {
            permission.status = EntityStatus::Inactive;
        }
        (admin_id, editor_id)
    };

    let effective = fixture.resolver.effective_permissions(admin_id).await;
    assert_eq!(
        effective.ok(),
        Some(vec![code("product.edit"), code("product.view")])
    );

    let deactivated = fixture
        .resolver
        .deactivate_role(&fixture.actor, editor_id)
        .await;
    assert!(matches!(
        deactivated,
        Ok(ref role) if role.status == EntityStatus::Inactive
    ));

    let effective = fixture.resolver.effective_permissions(admin_id).await;
    assert_eq!(effective.ok(), Some(vec![code("product.view")]));
    let allowed = fixture
        .resolver
        .has_permission(admin_id, "product.edit")
        .await;
    assert!(matches!(allowed, Ok(false)));
}

#[tokio::test]
async fn system_roles_reject_rename_delete_and_deactivate() {
    let fixture = fixture();
    let role_id = fixture
        .harness
        .store
        .state
        .lock()
        .await
        .add_role("super_admin", true);
    let before = fixture.harness.store.snapshot().await.roles;

    let renamed = fixture
        .resolver
        .update_role(
            &fixture.actor,
            role_id,
            UpdateRoleInput {
                name: Some("Root".to_owned()),
                ..UpdateRoleInput::default()
            },
        )
        .await;
    let described = fixture
        .resolver
        .update_role(
            &fixture.actor,
            role_id,
            UpdateRoleInput {
                description: Some(Some("changed".to_owned())),
                ..UpdateRoleInput::default()
            },
        )
        .await;
    let unchanged = fixture
        .resolver
        .update_role(
            &fixture.actor,
            role_id,
            UpdateRoleInput {
                code: Some("super_admin".to_owned()),
                ..UpdateRoleInput::default()
            },
        )
        .await;
    let deleted = fixture.resolver.delete_role(&fixture.actor, role_id).await;
    let deactivated = fixture
        .resolver
        .deactivate_role(&fixture.actor, role_id)
        .await;

    assert!(matches!(renamed, Err(AppError::Constraint(_))));
    assert!(matches!(described, Err(AppError::Constraint(_))));
    assert!(matches!(unchanged, Err(AppError::Constraint(_))));
    assert!(matches!(deleted, Err(AppError::Constraint(_))));
    assert!(matches!(deactivated, Err(AppError::Constraint(_))));
    assert_eq!(fixture.harness.store.snapshot().await.roles, before);
    assert!(fixture.harness.audit.records.lock().await.is_empty());
}

#[tokio::test]
async fn in_use_entities_cannot_be_deleted() {
    let fixture = fixture();
    let (role_id, permission_id) = {
        let mut state = fixture.harness.store.state.lock().await;
        let admin_id = state.add_admin(2, "erin");
        let role_id = state.add_role("editor", false);
        let permission_id = state.add_permission("product.edit");
        state.grant(role_id, permission_id);
        state.assign(admin_id, role_id);
        (role_id, permission_id)
    };

    let role_deleted = fixture.resolver.delete_role(&fixture.actor, role_id).await;
    let permission_deleted = fixture
        .resolver
        .delete_permission(&fixture.actor, permission_id)
        .await;

    assert!(matches!(role_deleted, Err(AppError::Constraint(_))));
    assert!(matches!(permission_deleted, Err(AppError::Constraint(_))));

    let unassigned = fixture
        .resolver
        .revoke_role_from_admin(&fixture.actor, AdminId::new(2), role_id, None)
        .await;
    assert!(matches!(unassigned, Ok(true)));
    let role_deleted = fixture.resolver.delete_role(&fixture.actor, role_id).await;
    assert!(role_deleted.is_ok());

    let state = fixture.harness.store.snapshot().await;
    assert!(!state.roles.contains_key(&role_id));
    assert!(state.role_permissions.is_empty());
    let permission_deleted = fixture
        .resolver
        .delete_permission(&fixture.actor, permission_id)
        .await;
    assert!(permission_deleted.is_ok());
}

#[tokio::test]
async fn duplicate_names_and_codes_are_constraints() {
    let fixture = fixture();
    {
        let mut state = fixture.harness.store.state.lock().await;
        state.add_role("editor", false);
        state.add_permission("product.edit");
    }

    let duplicate_role = fixture
        .resolver
        .create_role(
            &fixture.actor,
            CreateRoleInput {
                name: "Another editor".to_owned(),
                code: "editor".to_owned(),
                description: None,
                is_system: false,
            },
        )
        .await;
    let duplicate_permission = fixture
        .resolver
        .create_permission(
            &fixture.actor,
            CreatePermissionInput {
                code: "product.edit".to_owned(),
                name: "Edit".to_owned(),
                description: None,
            },
        )
        .await;
    let invalid_code = fixture
        .resolver
        .create_role(
            &fixture.actor,
            CreateRoleInput {
                name: "Broken".to_owned(),
                code: "Not A Code".to_owned(),
                description: None,
                is_system: false,
            },
        )
        .await;

    assert!(matches!(duplicate_role, Err(AppError::Constraint(_))));
    assert!(matches!(duplicate_permission, Err(AppError::Constraint(_))));
    assert!(matches!(invalid_code, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn super_admin_code_needs_a_system_role() {
    let fixture = fixture();
    let role_id = fixture
        .harness
        .store
        .state
        .lock()
        .await
        .add_role("editor", false);

    let created = fixture
        .resolver
        .create_role(
            &fixture.actor,
            CreateRoleInput {
                name: "Root".to_owned(),
                code: "super_admin".to_owned(),
                description: None,
                is_system: false,
            },
        )
        .await;
    let recoded = fixture
        .resolver
        .update_role(
            &fixture.actor,
            role_id,
            UpdateRoleInput {
                code: Some("super_admin".to_owned()),
                ..UpdateRoleInput::default()
            },
        )
        .await;

    assert!(matches!(
        created,
        Err(AppError::Validation { ref field, .. }) if field == "code"
    ));
    assert!(matches!(recoded, Err(AppError::Constraint(_))));
    assert_eq!(fixture.harness.store.snapshot().await.roles.len(), 1);
}

#[tokio::test]
async fn updates_invalidate_cached_entities() {
    let fixture = fixture();
    let (role_id, permission_id) = {
        let mut state = fixture.harness.store.state.lock().await;
        (
            state.add_role("editor", false),
            state.add_permission("product.edit"),
        )
    };

    let Ok(role) = fixture.resolver.role(role_id).await else {
        panic!("role should load");
    };
    assert_eq!(role.name.as_str(), "editor");
    assert!(fixture.resolver.permission(permission_id).await.is_ok());
    assert!(fixture.resolver.roles().await.is_ok());

    let updated = fixture
        .resolver
        .update_role(
            &fixture.actor,
            role_id,
            UpdateRoleInput {
                name: Some("Content editor".to_owned()),
                description: Some(Some("Edits copy".to_owned())),
                ..UpdateRoleInput::default()
            },
        )
        .await;
    assert!(updated.is_ok());
    let renamed = fixture
        .resolver
        .update_permission(
            &fixture.actor,
            permission_id,
            UpdatePermissionInput {
                name: Some("Edit catalog products".to_owned()),
                ..UpdatePermissionInput::default()
            },
        )
        .await;
    assert!(renamed.is_ok());

    let Ok(role) = fixture.resolver.role(role_id).await else {
        panic!("role should load");
    };
    assert_eq!(role.name.as_str(), "Content editor");
    assert_eq!(role.description.as_deref(), Some("Edits copy"));
    let Ok(permission) = fixture.resolver.permission(permission_id).await else {
        panic!("permission should load");
    };
    assert_eq!(permission.name.as_str(), "Edit catalog products");
    let Ok(roles) = fixture.resolver.roles().await else {
        panic!("roles should load");
    };
    assert_eq!(roles[0].name.as_str(), "Content editor");
}

#[tokio::test]
async fn unknown_entities_are_not_cached() {
    let fixture = fixture();

    let missing = fixture.resolver.role(RoleId::new(404)).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    assert!(!fixture.harness.cache.contains("role:404").await);

    let missing = fixture.resolver.permission(PermissionId::new(404)).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn authorize_rejects_missing_principal_and_missing_permission() {
    let fixture = fixture();
    let principal = {
        let mut state = fixture.harness.store.state.lock().await;
        let admin_id = state.add_admin(11, "frank");
        let role_id = state.add_role("viewer", false);
        let view = state.add_permission("product.view");
        state.grant(role_id, view);
        state.assign(admin_id, role_id);
        AdminPrincipal::new(admin_id, "frank")
    };

    let anonymous = fixture
        .resolver
        .authorize(None, "product.view", None)
        .await;
    let allowed = fixture
        .resolver
        .authorize(Some(&principal), "product.view", Some("product:12"))
        .await;
    let denied = fixture
        .resolver
        .authorize(Some(&principal), "product.delete", Some("product:12"))
        .await;
    let system = fixture
        .resolver
        .authorize(Some(&AdminPrincipal::system()), "product.delete", None)
        .await;

    assert!(matches!(anonymous, Err(AppError::Unauthorized(_))));
    assert!(allowed.is_ok());
    assert!(matches!(denied, Err(AppError::Unauthorized(_))));
    assert!(system.is_ok());
}

#[tokio::test]
async fn bulk_assignment_reports_chunk_outcomes() {
    let harness = Harness::new();
    let coordinator = harness.coordinator.clone();
    let resolver = PermissionResolver::new(coordinator, Arc::clone(&harness.store) as _);
    let role_id = {
        let mut state = harness.store.state.lock().await;
        state.add_admin(1, "a");
        state.add_admin(2, "b");
        state.add_role("editor", false)
    };

    let outcomes = resolver
        .bulk_assign_role(
            &AdminPrincipal::system(),
            role_id,
            vec![AdminId::new(1), AdminId::new(2), AdminId::new(3)],
        )
        .await;

    let Ok(outcomes) = outcomes else {
        panic!("bulk assignment should report outcomes");
    };
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].result, Err(AppError::NotFound(_))));
    assert!(harness.store.snapshot().await.admin_roles.is_empty());
}
