//! Storage error types for the banner storage abstraction layer.
//!
//! This module defines all error types that can occur during relational store
//! and cache store operations.

use std::fmt;

/// Errors that can occur during relational storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity that was not found.
        entity: String,
        /// Identifier (or composite key) of the missing entity.
        id: String,
    },

    /// A content field is missing or has the wrong type.
    #[error("invalid type for parameter: {field}")]
    InvalidField {
        /// Name of the offending field.
        field: String,
    },

    /// An error occurred during a transaction.
    #[error("Transaction error: {message}")]
    TransactionError {
        /// Description of the transaction error.
        message: String,
    },

    /// Failed to connect to the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a new `InvalidField` error.
    #[must_use]
    pub fn invalid_field(field: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
        }
    }

    /// Creates a new `TransactionError` error.
    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::InvalidField { .. } => ErrorCategory::Validation,
            Self::TransactionError { .. } => ErrorCategory::Transaction,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Errors reported by a cache backend.
///
/// A cache miss is not an error; backends return `Ok(None)` for it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached (pool exhausted, connection refused).
    #[error("Cache backend unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The backend was reached but the command failed.
    #[error("Cache command failed: {message}")]
    Command {
        /// Description of the failure.
        message: String,
    },

    /// A value could not be encoded for the cache.
    #[error("Cache encoding error: {message}")]
    Encoding {
        /// Description of the failure.
        message: String,
    },
}

impl CacheError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Creates a new `Encoding` error.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Entity not found.
    NotFound,
    /// Validation error.
    Validation,
    /// Transaction-related error.
    Transaction,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Validation => write!(f, "validation"),
            Self::Transaction => write!(f, "transaction"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("Banner", 42);
        assert_eq!(err.to_string(), "Banner not found: 42");

        let err = StorageError::invalid_field("title");
        assert_eq!(err.to_string(), "invalid type for parameter: title");

        let err = CacheError::unavailable("connection refused");
        assert_eq!(
            err.to_string(),
            "Cache backend unavailable: connection refused"
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found("Banner", 1).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::invalid_field("url").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            StorageError::connection_error("down").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            StorageError::transaction_error("rolled back").category().to_string(),
            "transaction"
        );
        assert!(StorageError::not_found("Banner", 1).is_not_found());
        assert!(!StorageError::internal("boom").is_not_found());
    }
}
