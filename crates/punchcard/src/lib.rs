//! # Punchcard
//!
//! Session persistence and access control for the Punchcard web app,
//! packaged as axum middleware.
//!
//! ## Overview
//!
//! Each request passes through up to four gates, outermost first:
//!
//! 1. **Session layer** ([`session_layer`]): loads the session named by the
//!    `punchcard.sid` cookie from the store, and writes it back afterwards.
//! 2. **CSRF guard** ([`csrf_guard`]): mints the session's token, echoes it
//!    in `x-csrf-token`, and validates unsafe authenticated requests.
//! 3. **Auth gate** ([`require_auth`]): 401 without a logged-in identity.
//! 4. **Admin gate** ([`require_admin_access`]): resolves the employee's
//!    [`PermissionSet`](perms::PermissionSet) and applies a predicate.
//!
//! Sessions are stored in SQLite, sealed with ChaCha20-Poly1305 when
//! `SESSION_ENCRYPTION_KEY` is set.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use axum::{middleware, routing::{get, post}, Router};
//! use punchcard::{require_admin_access, require_auth, Gate, GateConfig};
//!
//! async fn example() -> anyhow::Result<()> {
//!     punchcard::telemetry::init()?;
//!     let gate = Gate::open(GateConfig::from_env()?)?;
//!
//!     let admin = Router::new()
//!         .route("/admin/payroll", get(|| async { "payroll" }))
//!         .route_layer(middleware::from_fn_with_state(
//!             gate.admin_guard(),
//!             require_admin_access,
//!         ));
//!
//!     let app = Router::new()
//!         .route("/api/time-entries", post(|| async { "ok" }))
//!         .route_layer(middleware::from_fn(require_auth))
//!         .merge(admin);
//!     let app = gate.protect(app);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `punchcard::core` - Session state, envelopes, identifiers
//! - `punchcard::store` - Session and settings storage
//! - `punchcard::perms` - Permission sets and override resolution

pub mod auth;
pub mod config;
pub mod csrf;
pub mod error;
pub mod gate;
pub mod session;
pub mod telemetry;

pub use auth::{require_admin_access, require_auth, AdminGuard, PermissionPredicate};
pub use config::GateConfig;
pub use csrf::{csrf_guard, CsrfOutcome, CSRF_HEADER};
pub use error::{GateError, Result};
pub use gate::Gate;
pub use session::{session_layer, SessionHandle};

// Re-export component crates
pub use punchcard_core as core;
pub use punchcard_perms as perms;
pub use punchcard_store as store;
