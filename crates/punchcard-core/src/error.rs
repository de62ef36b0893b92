//! Error types for Punchcard Core.

use thiserror::Error;

/// Errors raised while parsing a stored ciphertext envelope.
///
/// These never cross the store boundary: `open` turns every one of them into
/// "no recoverable session".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(String),

    #[error("envelope is missing its {0} component")]
    MissingComponent(&'static str),

    #[error("envelope has trailing components")]
    TrailingComponents,

    #[error("envelope {component} is not valid hex")]
    InvalidHex { component: &'static str },

    #[error("envelope {component} has length {actual}, expected {expected}")]
    InvalidLength {
        component: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Core errors that can occur while sealing or encoding session state.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] EnvelopeError),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    /// An application value used a key owned by the session itself.
    #[error("session key {0:?} is reserved")]
    ReservedKey(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
