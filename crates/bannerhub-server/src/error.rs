//! Service-level error type.

use std::time::Duration;

use bannerhub_storage::{CacheError, StorageError};
use thiserror::Error;

/// Errors surfaced by [`crate::BannerService`] and its components.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// An input failed validation.
    #[error("invalid type for parameter: {field}")]
    Validation { field: String },

    /// A numeric input was outside its allowed range.
    #[error("parameter out of range: {field} must be positive")]
    OutOfRange { field: String },

    /// A component was built from settings it cannot run with.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No banner matched the request.
    #[error("banner not found")]
    NotFound,

    /// The cache backend failed and the failure policy propagated it.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The relational store failed.
    #[error(transparent)]
    Store(StorageError),

    /// The deletion batcher did not reach its stopped state in time.
    #[error("deletion batcher did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    /// The deletion batcher no longer accepts ids.
    #[error("deletion batcher is shutting down")]
    ShuttingDown,
}

impl ServiceError {
    pub fn validation(field: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
        }
    }

    pub fn out_of_range(field: impl Into<String>) -> Self {
        Self::OutOfRange {
            field: field.into(),
        }
    }

    /// Whether the caller sent bad input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::OutOfRange { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::NotFound,
            StorageError::InvalidField { field } => Self::Validation { field },
            other => Self::Store(other),
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
