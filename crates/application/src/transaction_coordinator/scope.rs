use vitrine_core::AppResult;

use crate::access_ports::{AuditRecord, DataStoreTransaction, TransactionStatus};
use crate::invalidation_queue::{CacheInvalidationEntry, CacheInvalidationQueue, DeferredAction};

/// Handle given to an operation body for the lifetime of one transaction.
///
/// Writes go through [`TransactionScope::store`]. Cache invalidations and
/// audit records are staged here and only take effect after commit.
pub struct TransactionScope {
    operation: String,
    transaction: Box<dyn DataStoreTransaction>,
    invalidations: CacheInvalidationQueue,
    audit_records: Vec<AuditRecord>,
}

impl TransactionScope {
    pub(super) fn new(operation: String, transaction: Box<dyn DataStoreTransaction>) -> Self {
        Self {
            operation,
            transaction,
            invalidations: CacheInvalidationQueue::new(),
            audit_records: Vec::new(),
        }
    }

    /// Returns the operation name used in logs and errors.
    #[must_use]
    pub fn operation(&self) -> &str {
        self.operation.as_str()
    }

    /// Returns the open transaction.
    pub fn store(&mut self) -> &mut dyn DataStoreTransaction {
        self.transaction.as_mut()
    }

    /// Returns the status reported by the open transaction.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.transaction.status()
    }

    /// Stages one cache side effect.
    pub fn enqueue(&mut self, entry: CacheInvalidationEntry) -> AppResult<()> {
        self.invalidations.enqueue(entry)
    }

    /// Stages deletion of one key.
    pub fn invalidate_key(&mut self, key: impl Into<String>) -> AppResult<()> {
        self.enqueue(CacheInvalidationEntry::Key(key.into()))
    }

    /// Stages deletion of every key matching a glob.
    pub fn invalidate_pattern(&mut self, pattern: impl Into<String>) -> AppResult<()> {
        self.enqueue(CacheInvalidationEntry::Pattern(pattern.into()))
    }

    /// Stages a callback run after commit.
    pub fn defer(
        &mut self,
        label: impl Into<String>,
        action: impl FnOnce() -> AppResult<()> + Send + 'static,
    ) -> AppResult<()> {
        self.enqueue(CacheInvalidationEntry::Action(DeferredAction::new(
            label, action,
        )))
    }

    /// Stages an audit record delivered after commit.
    pub fn record_audit(&mut self, record: AuditRecord) {
        self.audit_records.push(record);
    }

    /// Returns how many cache side effects are staged.
    #[must_use]
    pub fn pending_invalidations(&self) -> usize {
        self.invalidations.len()
    }

    pub(super) fn into_parts(
        self,
    ) -> (
        Box<dyn DataStoreTransaction>,
        CacheInvalidationQueue,
        Vec<AuditRecord>,
    ) {
        (self.transaction, self.invalidations, self.audit_records)
    }
}
