use std::fmt::{Debug, Formatter};

use tracing::warn;
use vitrine_core::{AppError, AppResult};

use crate::access_ports::CacheStore;

/// Callback executed after commit in place of a plain key deletion.
pub struct DeferredAction {
    label: String,
    action: Box<dyn FnOnce() -> AppResult<()> + Send>,
}

impl DeferredAction {
    /// Wraps a callback under a label used in logs.
    pub fn new(
        label: impl Into<String>,
        action: impl FnOnce() -> AppResult<()> + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            action: Box::new(action),
        }
    }

    /// Returns the log label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    fn invoke(self) -> AppResult<()> {
        (self.action)()
    }
}

impl Debug for DeferredAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DeferredAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// One pending cache side effect.
#[derive(Debug)]
pub enum CacheInvalidationEntry {
    /// Delete one key.
    Key(String),
    /// Delete every key matching a glob.
    Pattern(String),
    /// Run a callback.
    Action(DeferredAction),
}

impl CacheInvalidationEntry {
    fn describe(&self) -> String {
        match self {
            Self::Key(key) => format!("key '{key}'"),
            Self::Pattern(pattern) => format!("pattern '{pattern}'"),
            Self::Action(action) => format!("action '{}'", action.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
    Open,
    Flushed,
    Discarded,
}

/// Outcome of flushing a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries applied without error.
    pub applied: usize,
    /// Entries whose application failed and was logged.
    pub failed: usize,
}

/// Ordered cache side effects staged by one transaction.
///
/// The queue is flushed once after commit or discarded once after rollback.
/// Either way it rejects later entries.
#[derive(Debug)]
pub struct CacheInvalidationQueue {
    entries: Vec<CacheInvalidationEntry>,
    state: QueueState,
}

impl Default for CacheInvalidationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheInvalidationQueue {
    /// Creates an empty open queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            state: QueueState::Open,
        }
    }

    /// Appends one entry.
    pub fn enqueue(&mut self, entry: CacheInvalidationEntry) -> AppResult<()> {
        match self.state {
            QueueState::Open => {
                self.entries.push(entry);
                Ok(())
            }
            QueueState::Flushed | QueueState::Discarded => Err(AppError::Internal(format!(
                "cannot enqueue {} on a closed invalidation queue",
                entry.describe()
            ))),
        }
    }

    /// Returns the number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no entry is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies every entry in insertion order.
    ///
    /// A failing entry is logged and does not stop the remaining ones.
    pub async fn flush(&mut self, cache: &dyn CacheStore) -> FlushReport {
        let mut report = FlushReport::default();
        if self.state != QueueState::Open {
            return report;
        }
        self.state = QueueState::Flushed;

        for entry in self.entries.drain(..) {
            let description = entry.describe();
            let result = match entry {
                CacheInvalidationEntry::Key(key) => cache.delete(&key).await.map(|_| ()),
                CacheInvalidationEntry::Pattern(pattern) => {
                    cache.delete_matching(&pattern).await.map(|_| ())
                }
                CacheInvalidationEntry::Action(action) => action.invoke(),
            };

            match result {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    report.failed += 1;
                    warn!(entry = %description, error = %error, "cache invalidation failed");
                }
            }
        }

        report
    }

    /// Drops every entry without applying it and returns how many were pending.
    pub fn discard(&mut self) -> usize {
        if self.state != QueueState::Open {
            return 0;
        }
        self.state = QueueState::Discarded;

        let discarded = self.entries.len();
        self.entries.clear();
        discarded
    }
}
