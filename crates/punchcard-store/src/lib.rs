//! # Punchcard Store
//!
//! Storage abstraction for Punchcard. Provides trait-based interfaces for
//! session persistence and for the generic settings collaborator, with
//! SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`SessionStore`] - Async trait for session records (`get`/`set`/`touch`/`destroy`)
//! - [`SettingsStore`] - Async trait for opaque key-value settings
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use punchcard_core::{CookieMeta, SessionCodec, SessionData, SessionId};
//! use punchcard_store::{SessionStore, SqliteStore};
//!
//! async fn example() {
//!     let codec = SessionCodec::from_secret(std::env::var("SESSION_ENCRYPTION_KEY").ok().as_deref());
//!     let store = SqliteStore::open("punchcard.db", codec).unwrap();
//!
//!     let sid = SessionId::generate();
//!     let session = SessionData::new(CookieMeta::with_max_age(punchcard_core::now_millis(), 3_600_000));
//!     store.set(&sid, &session).await.unwrap();
//!     assert!(store.get(&sid).await.unwrap().is_some());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Sealed at rest**: session state passes through a [`punchcard_core::SessionCodec`]
//! - **Soft reads**: absent, expired, and unreadable sessions read as `None`
//! - **Lazy expiry**: expired records are deleted when read
//! - **Sweep on write**: every `set` deletes all expired records

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{SessionStore, SettingsStore};
