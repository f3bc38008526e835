use std::ops::Range;
use std::time::Instant;

use tracing::{info, warn};

use super::*;

/// Result of one chunk processed by [`TransactionCoordinator::batch`].
#[derive(Debug)]
pub struct ChunkOutcome<T> {
    /// Zero-based chunk index.
    pub index: usize,
    /// Positions of the chunk items in the input.
    pub range: Range<usize>,
    /// Per-item results when the chunk committed, or the chunk error.
    pub result: AppResult<Vec<T>>,
}

impl<T> ChunkOutcome<T> {
    /// Returns whether the chunk committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.result.is_ok()
    }
}

impl TransactionCoordinator {
    /// Processes `items` in chunks of `batch_size`, one transaction per chunk.
    ///
    /// A failing chunk rolls back only its own items; earlier chunks stay
    /// committed and later chunks still run.
    pub async fn batch<I, T, F>(
        &self,
        operation_name: &str,
        items: Vec<I>,
        item_operation: F,
        batch_size: usize,
    ) -> AppResult<Vec<ChunkOutcome<T>>>
    where
        I: Send,
        T: Send,
        F: for<'c> Fn(&'c mut TransactionScope, I) -> OperationFuture<'c, T> + Send + Sync,
    {
        if batch_size == 0 {
            return Err(AppError::validation(
                "batch_size",
                "batch size must be greater than zero",
            ));
        }

        let total = items.len();
        let mut outcomes = Vec::with_capacity(total.div_ceil(batch_size));
        let mut items = items.into_iter();
        let mut offset = 0;

        while offset < total {
            let chunk: Vec<I> = items.by_ref().take(batch_size).collect();
            let range = offset..offset + chunk.len();
            let index = outcomes.len();
            let chunk_name = format!("{operation_name}[chunk {index}]");
            offset = range.end;

            let started = Instant::now();
            let result = match self.begin(&chunk_name, started).await {
                Ok(mut scope) => {
                    let mut outcome = Ok(Vec::with_capacity(chunk.len()));
                    for item in chunk {
                        match item_operation(&mut scope, item).await {
                            Ok(value) => {
                                if let Ok(values) = outcome.as_mut() {
                                    values.push(value);
                                }
                            }
                            Err(error) => {
                                outcome = Err(error);
                                break;
                            }
                        }
                    }
                    self.finish(scope, outcome, started).await
                }
                Err(error) => Err(error),
            };

            if let Err(error) = &result {
                warn!(
                    operation = %operation_name,
                    chunk = index,
                    error = %error,
                    "batch chunk rolled back"
                );
            }
            outcomes.push(ChunkOutcome {
                index,
                range,
                result,
            });
        }

        info!(
            operation = %operation_name,
            items = total,
            chunks = outcomes.len(),
            failed_chunks = outcomes.iter().filter(|outcome| !outcome.is_committed()).count(),
            "batch finished"
        );

        Ok(outcomes)
    }
}
