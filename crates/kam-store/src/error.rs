//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// Every variant means the store could not give a definitive answer. None of
/// them may be read as "not authorized".
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A write collided with a concurrent write to the same pair.
    #[error("conflicting write for {package_name}/{identity}: {detail}")]
    Conflict {
        package_name: String,
        identity: String,
        detail: String,
    },

    /// The backend cannot serve requests (poisoned lock, failed worker).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
