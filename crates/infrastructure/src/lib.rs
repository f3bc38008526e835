//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_cache_store;
mod in_memory_rbac_store;
mod postgres_audit_sink;
mod postgres_rbac_store;
mod redis_cache_store;
mod tracing_audit_sink;

pub use in_memory_cache_store::InMemoryCacheStore;
pub use in_memory_rbac_store::InMemoryRbacStore;
pub use postgres_audit_sink::PostgresAuditSink;
pub use postgres_rbac_store::PostgresRbacStore;
pub use redis_cache_store::RedisCacheStore;
pub use tracing_audit_sink::TracingAuditSink;
