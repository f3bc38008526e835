use async_trait::async_trait;
use serde_json::Value;
use vitrine_core::{AdminId, AppResult};
use vitrine_domain::AuditAction;

/// Audit payload describing one committed mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Entity type label, such as `rbac_role`.
    pub entity_type: String,
    /// Entity identifier.
    pub entity_id: String,
    /// Snapshot before the change.
    pub old_values: Option<Value>,
    /// Snapshot after the change.
    pub new_values: Option<Value>,
    /// Admin that performed the change.
    pub actor_id: Option<AdminId>,
    /// Free-form context, always a JSON object.
    pub context: Value,
}

/// Port receiving audit records.
///
/// Callers log failures and never propagate them.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists one audit record.
    async fn record(&self, record: AuditRecord) -> AppResult<()>;
}
