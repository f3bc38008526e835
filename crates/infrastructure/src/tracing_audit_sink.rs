//! Audit sink for development. Writes audit records to tracing output.

use async_trait::async_trait;
use tracing::info;
use vitrine_application::{AuditRecord, AuditSink};
use vitrine_core::AppResult;

/// Development audit sink that logs records instead of persisting them.
#[derive(Clone)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    /// Creates a new tracing audit sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) -> AppResult<()> {
        info!(
            action = record.action.as_str(),
            entity_type = record.entity_type.as_str(),
            entity_id = record.entity_id.as_str(),
            actor_id = record.actor_id.map(|actor_id| actor_id.value()),
            context = %record.context,
            "audit record"
        );

        Ok(())
    }
}
