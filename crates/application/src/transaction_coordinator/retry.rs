use vitrine_core::AppError;

const TRANSIENT_MESSAGE_PATTERNS: &[&str] = &[
    "deadlock",
    "lock wait timeout",
    "lock timeout",
    "could not obtain lock",
    "serialization failure",
    "could not serialize",
    "connection reset",
    "connection refused",
    "connection closed",
    "connection lost",
    "broken pipe",
    "server has gone away",
    "timed out",
    "timeout",
];

/// Returns whether an error message describes a retryable store failure.
#[must_use]
pub fn is_transient_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    TRANSIENT_MESSAGE_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

/// Promotes unclassified errors that look retryable to [`AppError::Transient`].
///
/// Already classified errors pass through unchanged.
#[must_use]
pub fn classify_error(error: AppError) -> AppError {
    match error {
        AppError::Internal(message) if is_transient_message(&message) => {
            AppError::Transient(message)
        }
        other => other,
    }
}
