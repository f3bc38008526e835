use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use vitrine_core::{AppError, AppResult};

use crate::access_ports::{AuditSink, CacheStore, TransactionStatus, TransactionalDataStore};
use crate::config::CoordinatorConfig;

mod batch;
mod metrics;
mod retry;
mod scope;

pub use batch::ChunkOutcome;
pub use metrics::MetricsSnapshot;
pub use retry::{classify_error, is_transient_message};
pub use scope::TransactionScope;

use metrics::CoordinatorMetrics;

/// Boxed future returned by an operation body borrowing its scope.
pub type OperationFuture<'c, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'c>>;

/// Runs units of work in a transaction and applies cache side effects only
/// after commit.
#[derive(Clone)]
pub struct TransactionCoordinator {
    data_store: Arc<dyn TransactionalDataStore>,
    cache: Arc<dyn CacheStore>,
    audit_sink: Arc<dyn AuditSink>,
    config: CoordinatorConfig,
    metrics: Arc<CoordinatorMetrics>,
    operation_sequence: Arc<AtomicU64>,
}

impl TransactionCoordinator {
    /// Creates a coordinator from required dependencies.
    #[must_use]
    pub fn new(
        data_store: Arc<dyn TransactionalDataStore>,
        cache: Arc<dyn CacheStore>,
        audit_sink: Arc<dyn AuditSink>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            data_store,
            cache,
            audit_sink,
            config,
            metrics: Arc::new(CoordinatorMetrics::default()),
            operation_sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the retry and batching configuration.
    #[must_use]
    pub fn config(&self) -> CoordinatorConfig {
        self.config
    }

    /// Returns a copy of the coordinator counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Runs `operation` in one transaction.
    ///
    /// Commits when the body succeeds and the transaction is still healthy,
    /// then flushes staged invalidations and delivers staged audit records.
    /// Anything else rolls back and discards both.
    pub async fn run<T, F>(&self, operation_name: &str, operation: F) -> AppResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut TransactionScope) -> OperationFuture<'c, T> + Send,
    {
        let started = Instant::now();
        let mut scope = self.begin(operation_name, started).await?;
        let outcome = operation(&mut scope).await;

        self.finish(scope, outcome, started).await
    }

    /// Runs `operation` under a generated `operation-{n}` name.
    pub async fn run_unnamed<T, F>(&self, operation: F) -> AppResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut TransactionScope) -> OperationFuture<'c, T> + Send,
    {
        let sequence = self.operation_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let operation_name = format!("operation-{sequence}");

        self.run(&operation_name, operation).await
    }

    /// Runs `operation`, retrying transient failures with a fixed delay.
    ///
    /// Non-transient errors return after the first attempt. Transient errors
    /// that outlive `max_attempts` surface as [`AppError::Internal`].
    pub async fn run_with_retry<T, F>(
        &self,
        operation_name: &str,
        operation: F,
        max_attempts: u32,
        delay: Duration,
    ) -> AppResult<T>
    where
        T: Send,
        F: for<'c> Fn(&'c mut TransactionScope) -> OperationFuture<'c, T> + Send + Sync,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.run(operation_name, &operation).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    warn!(
                        operation = %operation_name,
                        attempt,
                        max_attempts,
                        error = %error,
                        "transient failure, retrying operation"
                    );
                    self.metrics.record_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) if error.is_transient() => {
                    return Err(AppError::Internal(format!(
                        "operation '{operation_name}' exhausted {attempt} attempts: {error}"
                    )));
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Runs `operation` with the configured attempt limit and delay.
    pub async fn run_with_default_retry<T, F>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> AppResult<T>
    where
        T: Send,
        F: for<'c> Fn(&'c mut TransactionScope) -> OperationFuture<'c, T> + Send + Sync,
    {
        self.run_with_retry(
            operation_name,
            operation,
            self.config.max_retry_attempts,
            self.config.retry_delay,
        )
        .await
    }

    /// Read-through cache lookup outside any transaction.
    ///
    /// Cache failures and undecodable entries are logged and treated as misses.
    pub async fn cached_read<T, F, Fut>(
        &self,
        key: &str,
        ttl_seconds: u64,
        compute: F,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AppResult<T>> + Send,
    {
        match self.cache.get(key).await {
            Ok(Some(encoded)) => match serde_json::from_str::<T>(&encoded) {
                Ok(value) => {
                    self.metrics.record_cache_hit();
                    return Ok(value);
                }
                Err(error) => {
                    warn!(key = %key, error = %error, "discarding undecodable cache entry");
                }
            },
            Ok(None) => {}
            Err(error) => {
                warn!(key = %key, error = %error, "cache read failed, computing value");
            }
        }

        self.metrics.record_cache_miss();
        let value = compute().await?;

        match serde_json::to_string(&value) {
            Ok(encoded) => {
                if let Err(error) = self.cache.set(key, encoded, ttl_seconds).await {
                    warn!(key = %key, error = %error, "cache write failed");
                }
            }
            Err(error) => {
                warn!(key = %key, error = %error, "failed to encode cache entry");
            }
        }

        Ok(value)
    }

    async fn begin(&self, operation_name: &str, started: Instant) -> AppResult<TransactionScope> {
        self.metrics.record_attempt();

        match self.data_store.begin().await {
            Ok(transaction) => {
                debug!(operation = %operation_name, "transaction started");
                Ok(TransactionScope::new(operation_name.to_owned(), transaction))
            }
            Err(error) => {
                self.metrics.record_failure(started.elapsed());
                let error = classify_error(error);
                warn!(operation = %operation_name, error = %error, "failed to begin transaction");
                Err(error)
            }
        }
    }

    async fn finish<T>(
        &self,
        scope: TransactionScope,
        outcome: AppResult<T>,
        started: Instant,
    ) -> AppResult<T> {
        let operation_name = scope.operation().to_owned();
        let outcome = match outcome {
            Ok(_) if scope.status() == TransactionStatus::Failed => {
                Err(AppError::TransactionFailed(operation_name.clone()))
            }
            other => other,
        };
        let (transaction, mut invalidations, audit_records) = scope.into_parts();

        let value = match outcome {
            Ok(value) => value,
            Err(operation_error) => {
                if let Err(rollback_error) = transaction.rollback().await {
                    error!(
                        operation = %operation_name,
                        error = %rollback_error,
                        "rollback failed"
                    );
                }
                let discarded = invalidations.discard();
                self.metrics.record_failure(started.elapsed());

                let operation_error = classify_error(operation_error);
                debug!(
                    operation = %operation_name,
                    discarded_invalidations = discarded,
                    discarded_audits = audit_records.len(),
                    error = %operation_error,
                    "transaction rolled back"
                );
                return Err(operation_error);
            }
        };

        if let Err(commit_error) = transaction.commit().await {
            invalidations.discard();
            self.metrics.record_failure(started.elapsed());
            let commit_error = classify_error(commit_error);
            warn!(operation = %operation_name, error = %commit_error, "commit failed");
            return Err(commit_error);
        }

        let report = invalidations.flush(self.cache.as_ref()).await;
        if report.failed > 0 {
            self.metrics.record_flush_failures(report.failed);
        }

        for record in audit_records {
            let action = record.action.as_str();
            if let Err(audit_error) = self.audit_sink.record(record).await {
                self.metrics.record_audit_failure();
                warn!(
                    operation = %operation_name,
                    action,
                    error = %audit_error,
                    "failed to deliver audit record"
                );
            }
        }

        self.metrics.record_success(started.elapsed());
        debug!(
            operation = %operation_name,
            invalidations_applied = report.applied,
            invalidations_failed = report.failed,
            "transaction committed"
        );

        Ok(value)
    }
}
