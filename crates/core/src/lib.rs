//! Shared primitives for all Rust crates in Vitrine.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::AdminPrincipal;

/// Result type used across Vitrine crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string, naming `field` on failure.
    pub fn new(field: &str, value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::validation(
                field,
                "value must not be empty or whitespace",
            ));
        }

        Ok(Self(value.trim().to_owned()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its stored value.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the stored value.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of an administrator account.
    AdminId
);
numeric_id!(
    /// Identifier of a role.
    RoleId
);
numeric_id!(
    /// Identifier of a permission.
    PermissionId
);

impl AdminId {
    /// Reserved identifier that authorizes every operation.
    pub const SYSTEM: Self = Self(0);

    /// Returns whether this is the reserved system principal.
    #[must_use]
    pub const fn is_system(self) -> bool {
        self.0 == 0
    }
}

/// Error taxonomy exposed to callers for branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input.
    Validation,
    /// Referenced entity does not exist.
    NotFound,
    /// Business rule violation.
    Constraint,
    /// Principal missing or lacking permission.
    Unauthorized,
    /// Retryable data-store failure.
    Transient,
    /// Anything else.
    Fatal,
}

impl ErrorKind {
    /// Returns a stable label for logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Constraint => "constraint",
            Self::Unauthorized => "unauthorized",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        }
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input for one field.
    #[error("validation error on '{field}': {message}")]
    Validation {
        /// Offending field or configuration key.
        field: String,
        /// Human-readable reason.
        message: String,
    },

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation violates a business rule.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Principal is absent or not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Data-store failure expected to succeed on retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// Transaction was left in a failed state by a nested unit.
    #[error("transaction failed in operation '{0}'")]
    TransactionFailed(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Builds a validation error for one field.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Constraint(_) => ErrorKind::Constraint,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Transient(_) => ErrorKind::Transient,
            Self::TransactionFailed(_) | Self::Internal(_) => ErrorKind::Fatal,
        }
    }

    /// Returns whether the error is eligible for retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
