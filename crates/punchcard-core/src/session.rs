//! Session state and its stored encoding.
//!
//! [`SessionData`] is what a request sees; [`SessionCodec`] turns it into the
//! text column the store persists (JSON, sealed when a key is configured).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::crypto::{derive_key, SealKey};
use crate::envelope;
use crate::error::{CoreError, Result};
use crate::types::{random_hex, EmployeeId, TOKEN_BYTES};

/// Cookie metadata stored alongside the session.
///
/// `expires` drives the record's `expires_at` column; `None` means the
/// session never expires server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieMeta {
    /// Absolute expiry, Unix ms.
    #[serde(default)]
    pub expires: Option<i64>,
    /// Lifetime the cookie was issued with, ms.
    #[serde(default)]
    pub original_max_age: Option<i64>,
}

impl CookieMeta {
    /// A cookie living `max_age_ms` from `now`.
    pub fn with_max_age(now: i64, max_age_ms: i64) -> Self {
        Self {
            expires: Some(now.saturating_add(max_age_ms)),
            original_max_age: Some(max_age_ms),
        }
    }

    /// Push the expiry forward by the original lifetime (sliding expiration).
    pub fn refresh(&mut self, now: i64) {
        if let Some(max_age) = self.original_max_age {
            self.expires = Some(now.saturating_add(max_age));
        }
    }

    /// Whether the cookie has expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires, Some(at) if at <= now)
    }
}

/// The authenticated identity attached to a session after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Linked employee record, if any. Admin checks require one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<EmployeeId>,
}

impl SessionUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            employee_id: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_employee(mut self, employee_id: impl Into<EmployeeId>) -> Self {
        self.employee_id = Some(employee_id.into());
        self
    }
}

/// Top-level keys owned by [`SessionData`]. Application values stored in
/// `extra` may not use them.
pub const RESERVED_KEYS: [&str; 3] = ["cookie", "user", "csrfToken"];

/// Whether `key` names a built-in session field.
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Server-side session state.
///
/// Keys the core does not know about are kept in `extra` and round-trip
/// unchanged. `extra` shares the top-level JSON object with the built-in
/// fields, so it must never hold one of [`RESERVED_KEYS`]; encoding such a
/// session fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    #[serde(default)]
    pub cookie: CookieMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionData {
    /// A fresh, anonymous session.
    pub fn new(cookie: CookieMeta) -> Self {
        Self {
            cookie,
            ..Self::default()
        }
    }

    /// Whether an authenticated identity is present.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// The linked employee of the authenticated user, if any.
    pub fn employee_id(&self) -> Option<&EmployeeId> {
        self.user.as_ref().and_then(|u| u.employee_id.as_ref())
    }

    /// Return the session's CSRF token, minting one if it has none.
    ///
    /// The boolean is `true` when a token was minted and the session must be
    /// persisted.
    pub fn ensure_csrf_token(&mut self) -> (&str, bool) {
        let minted = self.csrf_token.is_none();
        let token = self
            .csrf_token
            .get_or_insert_with(|| random_hex(TOKEN_BYTES));
        (token.as_str(), minted)
    }

    /// Expiry to persist with the record.
    pub fn expires_at(&self) -> Option<i64> {
        self.cookie.expires
    }

    /// Store an application value, refusing keys of built-in fields.
    pub fn insert_extra(&mut self, key: impl Into<String>, value: Value) -> Result<Option<Value>> {
        let key = key.into();
        if is_reserved_key(&key) {
            return Err(CoreError::ReservedKey(key));
        }
        Ok(self.extra.insert(key, value))
    }

    /// Check that no application key shadows a built-in field.
    pub fn validate(&self) -> Result<()> {
        match self.extra.keys().find(|key| is_reserved_key(key)) {
            Some(key) => Err(CoreError::ReservedKey(key.clone())),
            None => Ok(()),
        }
    }
}

/// Encodes session state for storage, sealing it when a key is configured.
#[derive(Debug, Clone)]
pub struct SessionCodec {
    key: Option<SealKey>,
}

impl SessionCodec {
    /// Build from the configured secret.
    ///
    /// A missing secret disables encryption at rest; this is logged loudly
    /// since every session is then readable by anyone with database access.
    pub fn from_secret(secret: Option<&str>) -> Self {
        let key = derive_key(secret);
        if key.is_none() {
            warn!("no session encryption key configured; session state will be stored unencrypted");
        } else {
            info!("session encryption at rest enabled");
        }
        Self { key }
    }

    /// Codec that seals with the given key.
    pub fn with_key(key: SealKey) -> Self {
        Self { key: Some(key) }
    }

    /// Codec that stores plaintext JSON.
    pub fn plaintext() -> Self {
        Self { key: None }
    }

    /// Whether session state is sealed at rest.
    pub fn is_encrypting(&self) -> bool {
        self.key.is_some()
    }

    /// Serialize and seal.
    pub fn encode(&self, session: &SessionData) -> Result<String> {
        session.validate()?;
        let json =
            serde_json::to_string(session).map_err(|e| CoreError::EncodingError(e.to_string()))?;
        envelope::seal(&json, self.key.as_ref())
    }

    /// Open and deserialize. Anything unrecoverable yields `None`.
    pub fn decode(&self, stored: &str) -> Option<SessionData> {
        let json = envelope::open(stored, self.key.as_ref())?;
        match serde_json::from_str(&json) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "discarding session with undecodable state");
                None
            }
        }
    }
}
