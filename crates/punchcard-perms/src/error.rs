//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur while resolving permissions.
///
/// Malformed override data is never an error; it degrades to an empty map.
/// What remains is infrastructure failure, which callers must treat as
/// "deny".
#[derive(Debug, Error)]
pub enum PermsError {
    /// The settings collaborator failed.
    #[error("settings store error: {0}")]
    Store(#[from] punchcard_store::StoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
