//! # Punchcard Permissions
//!
//! Admin capability resolution for Punchcard.
//!
//! ## Overview
//!
//! Every admin has a fixed set of six capabilities. Unless an override says
//! otherwise they get [`PermissionSet::DEFAULT`]. Overrides live in a single
//! JSON object under the `access_admins` setting, keyed by employee id:
//!
//! ```json
//! { "42": { "view_payroll": true, "modify_pay_rates": "true" } }
//! ```
//!
//! ## Merge Rules
//!
//! When an employee has an override entry, the defaults no longer apply:
//!
//! - A field is granted only if its raw value is `true` or `"true"`.
//! - A missing field is denied, except `modify_payroll`, which follows the
//!   resolved `view_payroll` when its key is absent
//!   (see [`inherit_modify_payroll`]).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use punchcard_core::{EmployeeId, SessionCodec};
//! use punchcard_perms::AccessPolicyResolver;
//! use punchcard_store::SqliteStore;
//!
//! async fn example() {
//!     let store = Arc::new(SqliteStore::open("punchcard.db", SessionCodec::plaintext()).unwrap());
//!     let resolver = AccessPolicyResolver::new(store);
//!     let perms = resolver.admin_access_perms(&EmployeeId::from(42)).await.unwrap();
//!     if perms.view_payroll {
//!         // ...
//!     }
//! }
//! ```

pub mod error;
pub mod overrides;
pub mod permissions;
pub mod resolver;

pub use error::{PermsError, Result};
pub use overrides::{coerce_flag, inherit_modify_payroll, merge_override, OverrideMap, RawFlag, RawOverride};
pub use permissions::{Permission, PermissionSet};
pub use resolver::{AccessPolicyResolver, ACCESS_ADMINS_KEY};
