//! Application services and ports.

#![forbid(unsafe_code)]

mod access_admin_service;
mod access_ports;
mod invalidation_queue;
mod permission_resolver;
mod transaction_coordinator;

/// Cache key layout shared by services and adapters.
pub mod cache_keys;
/// Environment-driven tunables.
pub mod config;

#[cfg(test)]
mod test_support;

pub use access_admin_service::AccessAdminService;
pub use access_ports::{
    AuditRecord, AuditSink, CacheStats, CacheStore, DataStoreTransaction, RbacReader,
    TransactionStatus, TransactionalDataStore,
};
pub use config::{CacheTtlConfig, CoordinatorConfig};
pub use invalidation_queue::{
    CacheInvalidationEntry, CacheInvalidationQueue, DeferredAction, FlushReport,
};
pub use permission_resolver::{
    CreatePermissionInput, CreateRoleInput, PermissionResolver, UpdatePermissionInput,
    UpdateRoleInput,
};
pub use transaction_coordinator::{
    ChunkOutcome, MetricsSnapshot, OperationFuture, TransactionCoordinator, TransactionScope,
    classify_error, is_transient_message,
};
