//! Error types for the registry.

use kam_core::ValidationError;
use kam_store::StoreError;
use thiserror::Error;

/// Errors that can occur during registry operations.
///
/// A check that fails with any of these is indeterminate. Callers must not
/// treat it as a denial.
#[derive(Debug, Error)]
pub enum KamError {
    /// Malformed input.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Concurrent write detected by the backend.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence fault.
    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for KamError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => KamError::Conflict(err.to_string()),
            other => KamError::Storage(other),
        }
    }
}

impl KamError {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            KamError::Validation(_) => "validation_error",
            KamError::NotFound(_) => "not_found",
            KamError::Conflict(_) => "conflict",
            KamError::Storage(_) => "storage_error",
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, KamError>;
