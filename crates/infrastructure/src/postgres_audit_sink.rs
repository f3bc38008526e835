use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use vitrine_application::{AuditRecord, AuditSink};
use vitrine_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit sink.
#[derive(Clone)]
pub struct PostgresAuditSink {
    pool: PgPool,
}

impl PostgresAuditSink {
    /// Creates a sink with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn record(&self, record: AuditRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_audit_log (
                id,
                action,
                entity_type,
                entity_id,
                old_values,
                new_values,
                actor_id,
                context
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.action.as_str())
        .bind(record.entity_type)
        .bind(record.entity_id)
        .bind(record.old_values)
        .bind(record.new_values)
        .bind(record.actor_id.map(|actor_id| actor_id.value()))
        .bind(record.context)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit record: {error}")))?;

        Ok(())
    }
}
