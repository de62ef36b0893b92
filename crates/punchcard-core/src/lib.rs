//! # Punchcard Core
//!
//! Pure primitives for Punchcard: session state, sealed envelopes, and the
//! identifiers shared by every other crate.
//!
//! This crate contains no I/O, no storage, no HTTP.
//!
//! ## Key Types
//!
//! - [`SessionData`] - Server-side session state (cookie, user, CSRF token)
//! - [`SessionCodec`] - JSON encoding plus optional sealing at rest
//! - [`Envelope`] - Versioned ChaCha20-Poly1305 ciphertext envelope
//! - [`SessionId`], [`EmployeeId`] - Identifier newtypes
//!
//! ## Encryption
//!
//! The sealing key is derived from a configured secret with [`derive_key`].
//! When no secret is configured, state is stored as plaintext JSON. This is
//! an explicit mode, logged when the codec is built.

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod session;
pub mod types;

pub use crypto::{derive_key, SealKey, SealNonce};
pub use envelope::{open, seal, Envelope, EnvelopeVersion};
pub use error::{CoreError, EnvelopeError, Result};
pub use session::{
    is_reserved_key, CookieMeta, SessionCodec, SessionData, SessionUser, RESERVED_KEYS,
};
pub use types::{random_hex, EmployeeId, SessionId, TOKEN_BYTES};

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
