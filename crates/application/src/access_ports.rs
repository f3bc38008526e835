mod audit;
mod cache;
mod data_store;

pub use audit::{AuditRecord, AuditSink};
pub use cache::{CacheStats, CacheStore};
pub use data_store::{DataStoreTransaction, RbacReader, TransactionStatus, TransactionalDataStore};
