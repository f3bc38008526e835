use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};

use vitrine_application::{
    DataStoreTransaction, RbacReader, TransactionStatus, TransactionalDataStore,
};
use vitrine_core::{AdminId, AppError, AppResult, NonEmptyString, PermissionId, RoleId};
use vitrine_domain::{AdminAccount, EntityStatus, Permission, PermissionCode, Role, RoleCode};

mod transaction;

use transaction::PostgresRbacTransaction;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const QUERY_CANCELED: &str = "57014";
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL-backed role store.
#[derive(Clone)]
pub struct PostgresRbacStore {
    pool: PgPool,
}

impl PostgresRbacStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AdminRow {
    id: i64,
    username: String,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    code: String,
    description: Option<String>,
    is_system: bool,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: i64,
    code: String,
    name: String,
    description: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AdminRow> for AdminAccount {
    fn from(row: AdminRow) -> Self {
        Self {
            id: AdminId::new(row.id),
            username: row.username,
            is_active: row.is_active,
        }
    }
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        let decode = |error: AppError| {
            AppError::Internal(format!("failed to decode role {}: {error}", row.id))
        };

        Ok(Self {
            id: RoleId::new(row.id),
            name: NonEmptyString::new("name", row.name.as_str()).map_err(decode)?,
            code: RoleCode::new(row.code.as_str()).map_err(decode)?,
            description: row.description,
            is_system: row.is_system,
            status: EntityStatus::from_str(row.status.as_str()).map_err(decode)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<PermissionRow> for Permission {
    type Error = AppError;

    fn try_from(row: PermissionRow) -> Result<Self, Self::Error> {
        let decode = |error: AppError| {
            AppError::Internal(format!("failed to decode permission {}: {error}", row.id))
        };

        Ok(Self {
            id: PermissionId::new(row.id),
            code: PermissionCode::new(row.code.as_str()).map_err(decode)?,
            name: NonEmptyString::new("name", row.name.as_str()).map_err(decode)?,
            description: row.description,
            status: EntityStatus::from_str(row.status.as_str()).map_err(decode)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Maps a driver error onto the application error taxonomy.
fn map_sqlx_error(error: sqlx::Error, action: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        match database_error.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return AppError::Constraint(format!(
                    "failed to {action}: {}",
                    database_error.message()
                ));
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                return AppError::Constraint(format!(
                    "failed to {action}: referenced row is missing or still in use"
                ));
            }
            Some(
                SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE | QUERY_CANCELED,
            ) => {
                return AppError::Transient(format!("failed to {action}: {error}"));
            }
            _ => {}
        }
    }

    if matches!(
        error,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    ) {
        return AppError::Transient(format!("failed to {action}: {error}"));
    }

    AppError::Internal(format!("failed to {action}: {error}"))
}

fn count_from_row(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

async fn fetch_role<'e>(
    executor: impl PgExecutor<'e>,
    role_id: RoleId,
) -> AppResult<Option<Role>> {
    sqlx::query_as::<_, RoleRow>(
        r#"
        SELECT id, name, code, description, is_system, status, created_at, updated_at
        FROM rbac_roles
        WHERE id = $1
        "#,
    )
    .bind(role_id.value())
    .fetch_optional(executor)
    .await
    .map_err(|error| map_sqlx_error(error, "load role"))?
    .map(Role::try_from)
    .transpose()
}

async fn fetch_permission<'e>(
    executor: impl PgExecutor<'e>,
    permission_id: PermissionId,
) -> AppResult<Option<Permission>> {
    sqlx::query_as::<_, PermissionRow>(
        r#"
        SELECT id, code, name, description, status, created_at, updated_at
        FROM rbac_permissions
        WHERE id = $1
        "#,
    )
    .bind(permission_id.value())
    .fetch_optional(executor)
    .await
    .map_err(|error| map_sqlx_error(error, "load permission"))?
    .map(Permission::try_from)
    .transpose()
}

async fn fetch_admin_roles<'e>(
    executor: impl PgExecutor<'e>,
    admin_id: AdminId,
) -> AppResult<Vec<Role>> {
    let rows = sqlx::query_as::<_, RoleRow>(
        r#"
        SELECT roles.id, roles.name, roles.code, roles.description, roles.is_system,
            roles.status, roles.created_at, roles.updated_at
        FROM rbac_admin_roles AS admin_roles
        INNER JOIN rbac_roles AS roles ON roles.id = admin_roles.role_id
        WHERE admin_roles.admin_id = $1
        ORDER BY roles.name
        "#,
    )
    .bind(admin_id.value())
    .fetch_all(executor)
    .await
    .map_err(|error| map_sqlx_error(error, "list admin roles"))?;

    rows.into_iter().map(Role::try_from).collect()
}

#[async_trait]
impl TransactionalDataStore for PostgresRbacStore {
    async fn begin(&self) -> AppResult<Box<dyn DataStoreTransaction>> {
        let transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| map_sqlx_error(error, "begin transaction"))?;

        Ok(Box::new(PostgresRbacTransaction::new(transaction)))
    }
}

#[async_trait]
impl RbacReader for PostgresRbacStore {
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        fetch_role(&self.pool, role_id).await
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, code, description, is_system, status, created_at, updated_at
            FROM rbac_roles
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "list roles"))?;

        rows.into_iter().map(Role::try_from).collect()
    }

    async fn find_permission(&self, permission_id: PermissionId) -> AppResult<Option<Permission>> {
        fetch_permission(&self.pool, permission_id).await
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, code, name, description, status, created_at, updated_at
            FROM rbac_permissions
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "list permissions"))?;

        rows.into_iter().map(Permission::try_from).collect()
    }

    async fn list_role_permissions(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT permissions.id, permissions.code, permissions.name, permissions.description,
                permissions.status, permissions.created_at, permissions.updated_at
            FROM rbac_role_permissions AS grants
            INNER JOIN rbac_permissions AS permissions ON permissions.id = grants.permission_id
            WHERE grants.role_id = $1
            ORDER BY permissions.code
            "#,
        )
        .bind(role_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "list role permissions"))?;

        rows.into_iter().map(Permission::try_from).collect()
    }

    async fn list_admin_roles(&self, admin_id: AdminId) -> AppResult<Vec<Role>> {
        fetch_admin_roles(&self.pool, admin_id).await
    }
}
