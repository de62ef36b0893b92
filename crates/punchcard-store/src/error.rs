//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// Any of these is fatal for the request that triggered it. Absent, expired,
/// or unreadable sessions are not errors: they surface as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Session state could not be encoded for storage.
    #[error("encoding error: {0}")]
    Encoding(#[from] punchcard_core::CoreError),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("connection lock poisoned: {0}")]
    Poisoned(String),

    /// The blocking task running the query failed.
    #[error("storage task failed: {0}")]
    Task(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
