use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{Postgres, Transaction};
use vitrine_domain::{NewPermission, NewRole};

use super::*;

/// Open PostgreSQL transaction.
///
/// Any failed statement aborts the transaction server-side, so the first
/// error flips the status to failed and later statements are refused.
pub(super) struct PostgresRbacTransaction {
    transaction: Transaction<'static, Postgres>,
    failed: bool,
}

impl PostgresRbacTransaction {
    pub(super) fn new(transaction: Transaction<'static, Postgres>) -> Self {
        Self {
            transaction,
            failed: false,
        }
    }

    fn ensure_active(&self) -> AppResult<()> {
        if self.failed {
            return Err(AppError::Internal(
                "current transaction is aborted, commands ignored until rollback".to_owned(),
            ));
        }

        Ok(())
    }

    fn track<T>(&mut self, result: AppResult<T>) -> AppResult<T> {
        if result.is_err() {
            self.failed = true;
        }

        result
    }

    async fn fetch_role_by(&mut self, lookup: RoleLookup, value: &str) -> AppResult<Option<Role>> {
        self.ensure_active()?;
        let query = match lookup {
            RoleLookup::Name => {
                r#"
                SELECT id, name, code, description, is_system, status, created_at, updated_at
                FROM rbac_roles
                WHERE name = $1
                "#
            }
            RoleLookup::Code => {
                r#"
                SELECT id, name, code, description, is_system, status, created_at, updated_at
                FROM rbac_roles
                WHERE code = $1
                "#
            }
        };

        let result = sqlx::query_as::<_, RoleRow>(query)
            .bind(value)
            .fetch_optional(&mut *self.transaction)
            .await
            .map_err(|error| map_sqlx_error(error, "look up role"));

        self.track(result)?.map(Role::try_from).transpose()
    }

    async fn execute(
        &mut self,
        query: Query<'_, Postgres, PgArguments>,
        action: &str,
    ) -> AppResult<u64> {
        self.ensure_active()?;
        let result = query
            .execute(&mut *self.transaction)
            .await
            .map(|outcome| outcome.rows_affected())
            .map_err(|error| map_sqlx_error(error, action));

        self.track(result)
    }

    async fn fetch_count(&mut self, query: &'static str, id: i64, action: &str) -> AppResult<u64> {
        self.ensure_active()?;
        let result = sqlx::query_scalar::<_, i64>(query)
            .bind(id)
            .fetch_one(&mut *self.transaction)
            .await
            .map_err(|error| map_sqlx_error(error, action));

        self.track(result).map(count_from_row)
    }

    async fn fetch_exists(
        &mut self,
        query: &'static str,
        left: i64,
        right: i64,
        action: &str,
    ) -> AppResult<bool> {
        self.ensure_active()?;
        let result = sqlx::query_scalar::<_, bool>(query)
            .bind(left)
            .bind(right)
            .fetch_one(&mut *self.transaction)
            .await
            .map_err(|error| map_sqlx_error(error, action));

        self.track(result)
    }
}

#[derive(Debug, Clone, Copy)]
enum RoleLookup {
    Name,
    Code,
}

#[async_trait]
impl DataStoreTransaction for PostgresRbacTransaction {
    fn status(&self) -> TransactionStatus {
        if self.failed {
            TransactionStatus::Failed
        } else {
            TransactionStatus::Active
        }
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.ensure_active()?;
        let PostgresRbacTransaction { transaction, .. } = *self;
        transaction
            .commit()
            .await
            .map_err(|error| map_sqlx_error(error, "commit transaction"))
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let PostgresRbacTransaction { transaction, .. } = *self;
        transaction
            .rollback()
            .await
            .map_err(|error| map_sqlx_error(error, "roll back transaction"))
    }

    async fn find_admin(&mut self, admin_id: AdminId) -> AppResult<Option<AdminAccount>> {
        self.ensure_active()?;
        let result = sqlx::query_as::<_, AdminRow>(
            r#"
            SELECT id, username, is_active
            FROM admin_accounts
            WHERE id = $1
            "#,
        )
        .bind(admin_id.value())
        .fetch_optional(&mut *self.transaction)
        .await
        .map_err(|error| map_sqlx_error(error, "load admin"));

        Ok(self.track(result)?.map(AdminAccount::from))
    }

    async fn find_role(&mut self, role_id: RoleId) -> AppResult<Option<Role>> {
        self.ensure_active()?;
        let result = fetch_role(&mut *self.transaction, role_id).await;
        self.track(result)
    }

    async fn find_role_by_name(&mut self, name: &str) -> AppResult<Option<Role>> {
        self.fetch_role_by(RoleLookup::Name, name).await
    }

    async fn find_role_by_code(&mut self, code: &RoleCode) -> AppResult<Option<Role>> {
        self.fetch_role_by(RoleLookup::Code, code.as_str()).await
    }

    async fn find_permission(
        &mut self,
        permission_id: PermissionId,
    ) -> AppResult<Option<Permission>> {
        self.ensure_active()?;
        let result = fetch_permission(&mut *self.transaction, permission_id).await;
        self.track(result)
    }

    async fn find_permission_by_code(
        &mut self,
        code: &PermissionCode,
    ) -> AppResult<Option<Permission>> {
        self.ensure_active()?;
        let result = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, code, name, description, status, created_at, updated_at
            FROM rbac_permissions
            WHERE code = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&mut *self.transaction)
        .await
        .map_err(|error| map_sqlx_error(error, "look up permission"));

        self.track(result)?.map(Permission::try_from).transpose()
    }

    async fn list_admin_roles(&mut self, admin_id: AdminId) -> AppResult<Vec<Role>> {
        self.ensure_active()?;
        let result = fetch_admin_roles(&mut *self.transaction, admin_id).await;
        self.track(result)
    }

    async fn admin_has_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<bool> {
        self.fetch_exists(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM rbac_admin_roles WHERE admin_id = $1 AND role_id = $2
            )
            "#,
            admin_id.value(),
            role_id.value(),
            "check admin role",
        )
        .await
    }

    async fn role_has_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        self.fetch_exists(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM rbac_role_permissions WHERE role_id = $1 AND permission_id = $2
            )
            "#,
            role_id.value(),
            permission_id.value(),
            "check role permission",
        )
        .await
    }

    async fn count_role_admins(&mut self, role_id: RoleId) -> AppResult<u64> {
        self.fetch_count(
            "SELECT COUNT(*) FROM rbac_admin_roles WHERE role_id = $1",
            role_id.value(),
            "count role admins",
        )
        .await
    }

    async fn count_permission_roles(&mut self, permission_id: PermissionId) -> AppResult<u64> {
        self.fetch_count(
            "SELECT COUNT(*) FROM rbac_role_permissions WHERE permission_id = $1",
            permission_id.value(),
            "count permission roles",
        )
        .await
    }

    async fn insert_role(&mut self, role: NewRole) -> AppResult<Role> {
        self.ensure_active()?;
        let result = sqlx::query_as::<_, RoleRow>(
            r#"
            INSERT INTO rbac_roles (name, code, description, is_system, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, code, description, is_system, status, created_at, updated_at
            "#,
        )
        .bind(role.name.as_str())
        .bind(role.code.as_str())
        .bind(role.description.as_deref())
        .bind(role.is_system)
        .bind(EntityStatus::Active.as_str())
        .fetch_one(&mut *self.transaction)
        .await
        .map_err(|error| map_sqlx_error(error, "insert role"));

        Role::try_from(self.track(result)?)
    }

    async fn update_role(&mut self, role: &Role) -> AppResult<()> {
        let updated = self
            .execute(
                sqlx::query(
                    r#"
                    UPDATE rbac_roles
                    SET name = $2, code = $3, description = $4, status = $5, updated_at = $6
                    WHERE id = $1
                    "#,
                )
                .bind(role.id.value())
                .bind(role.name.as_str())
                .bind(role.code.as_str())
                .bind(role.description.as_deref())
                .bind(role.status.as_str())
                .bind(role.updated_at),
                "update role",
            )
            .await?;

        if updated == 0 {
            return Err(AppError::NotFound(format!("role {} does not exist", role.id)));
        }

        Ok(())
    }

    async fn delete_role(&mut self, role_id: RoleId) -> AppResult<()> {
        self.execute(
            sqlx::query("DELETE FROM rbac_role_permissions WHERE role_id = $1")
                .bind(role_id.value()),
            "delete role permissions",
        )
        .await?;
        self.execute(
            sqlx::query("DELETE FROM rbac_roles WHERE id = $1").bind(role_id.value()),
            "delete role",
        )
        .await?;

        Ok(())
    }

    async fn insert_permission(&mut self, permission: NewPermission) -> AppResult<Permission> {
        self.ensure_active()?;
        let result = sqlx::query_as::<_, PermissionRow>(
            r#"
            INSERT INTO rbac_permissions (code, name, description, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, code, name, description, status, created_at, updated_at
            "#,
        )
        .bind(permission.code.as_str())
        .bind(permission.name.as_str())
        .bind(permission.description.as_deref())
        .bind(EntityStatus::Active.as_str())
        .fetch_one(&mut *self.transaction)
        .await
        .map_err(|error| map_sqlx_error(error, "insert permission"));

        Permission::try_from(self.track(result)?)
    }

    async fn update_permission(&mut self, permission: &Permission) -> AppResult<()> {
        let updated = self
            .execute(
                sqlx::query(
                    r#"
                    UPDATE rbac_permissions
                    SET code = $2, name = $3, description = $4, status = $5, updated_at = $6
                    WHERE id = $1
                    "#,
                )
                .bind(permission.id.value())
                .bind(permission.code.as_str())
                .bind(permission.name.as_str())
                .bind(permission.description.as_deref())
                .bind(permission.status.as_str())
                .bind(permission.updated_at),
                "update permission",
            )
            .await?;

        if updated == 0 {
            return Err(AppError::NotFound(format!(
                "permission {} does not exist",
                permission.id
            )));
        }

        Ok(())
    }

    async fn delete_permission(&mut self, permission_id: PermissionId) -> AppResult<()> {
        self.execute(
            sqlx::query("DELETE FROM rbac_permissions WHERE id = $1").bind(permission_id.value()),
            "delete permission",
        )
        .await?;

        Ok(())
    }

    async fn insert_admin_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<()> {
        self.execute(
            sqlx::query(
                r#"
                INSERT INTO rbac_admin_roles (admin_id, role_id)
                VALUES ($1, $2)
                ON CONFLICT (admin_id, role_id) DO NOTHING
                "#,
            )
            .bind(admin_id.value())
            .bind(role_id.value()),
            "assign role to admin",
        )
        .await?;

        Ok(())
    }

    async fn delete_admin_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<()> {
        self.execute(
            sqlx::query("DELETE FROM rbac_admin_roles WHERE admin_id = $1 AND role_id = $2")
                .bind(admin_id.value())
                .bind(role_id.value()),
            "revoke role from admin",
        )
        .await?;

        Ok(())
    }

    async fn insert_role_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.execute(
            sqlx::query(
                r#"
                INSERT INTO rbac_role_permissions (role_id, permission_id)
                VALUES ($1, $2)
                ON CONFLICT (role_id, permission_id) DO NOTHING
                "#,
            )
            .bind(role_id.value())
            .bind(permission_id.value()),
            "grant permission to role",
        )
        .await?;

        Ok(())
    }

    async fn delete_role_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.execute(
            sqlx::query(
                "DELETE FROM rbac_role_permissions WHERE role_id = $1 AND permission_id = $2",
            )
            .bind(role_id.value())
            .bind(permission_id.value()),
            "revoke permission from role",
        )
        .await?;

        Ok(())
    }
}
