//! # Punchcard Testkit
//!
//! Testing utilities for Punchcard.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: SQLite-backed gates with helpers to plant logged-in
//!   sessions and permission overrides
//! - **Generators**: Proptest strategies for session state and raw overrides
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use punchcard_testkit::generators::session_data;
//!
//! proptest! {
//!     #[test]
//!     fn session_json_round_trips(data in session_data()) {
//!         let json = serde_json::to_string(&data).unwrap();
//!         prop_assert_eq!(serde_json::from_str::<SessionData>(&json).unwrap(), data);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use punchcard_testkit::TestFixture;
//!
//! let fixture = TestFixture::encrypted("secret");
//! let session = fixture.login_employee(42).await;
//! // send requests with `Cookie: {session.cookie}` and
//! // `x-csrf-token: {session.csrf_token}`
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{LoggedIn, TestFixture};
pub use generators::{raw_override, session_data, SECRET_MARKER};
