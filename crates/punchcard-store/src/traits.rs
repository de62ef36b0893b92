//! Store traits: the abstract interface for session and settings persistence.
//!
//! These traits let the HTTP layer stay storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use punchcard_core::{SessionData, SessionId};

use crate::error::Result;

/// The SessionStore trait: async interface for session persistence.
///
/// # Design Notes
///
/// - **Soft reads**: absent, expired, and undecryptable records all read as
///   `Ok(None)`. Only storage failures are errors.
/// - **Lazy expiry**: `get` deletes a record it finds past its expiry.
/// - **Amortized pruning**: every `set` sweeps all expired records.
/// - **Last write wins**: there is no per-session locking. Two concurrent
///   read-modify-write cycles on one session id race, and the later write
///   silently discards the earlier one.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session.
    async fn get(&self, sid: &SessionId) -> Result<Option<SessionData>>;

    /// Insert or replace a session.
    ///
    /// The record's expiry is taken from `session.cookie.expires`.
    async fn set(&self, sid: &SessionId, session: &SessionData) -> Result<()>;

    /// Rewrite an existing session with a refreshed expiry.
    ///
    /// Never creates a record. Returns whether the session existed.
    async fn touch(&self, sid: &SessionId, session: &SessionData) -> Result<bool>;

    /// Delete a session. Deleting an absent session is not an error.
    async fn destroy(&self, sid: &SessionId) -> Result<()>;

    /// Delete every record whose expiry is at or before `now`.
    ///
    /// Returns the number of records removed.
    async fn prune_expired(&self, now: i64) -> Result<usize>;

    /// Number of stored records, including expired ones not yet pruned.
    async fn len(&self) -> Result<usize>;

    /// Delete every session.
    async fn clear(&self) -> Result<()>;
}

/// Generic key-value settings collaborator.
///
/// Values are opaque text; callers own their format.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a setting.
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace a setting.
    async fn put_setting(&self, key: &str, value: &str) -> Result<()>;
}
