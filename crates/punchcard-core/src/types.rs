//! Strong type definitions for Punchcard.
//!
//! Identifiers are newtypes so a session id can never be passed where an
//! employee id is expected.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of random bytes behind a session id or CSRF token.
pub const TOKEN_BYTES: usize = 32;

/// An opaque session identifier, carried in the session cookie.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random session id (256 bits, hex encoded).
    pub fn generate() -> Self {
        Self(random_hex(TOKEN_BYTES))
    }

    /// Wrap an id received from a client cookie.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn prefix(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only a prefix: the full id is a bearer credential.
        write!(f, "SessionId({}…)", self.prefix())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}…", self.prefix())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of an employee record.
///
/// Employee ids arrive as integers from the database and as strings from
/// JSON object keys; both normalize to the same string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "EmployeeIdRepr", into = "String")]
pub struct EmployeeId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum EmployeeIdRepr {
    Int(i64),
    Text(String),
}

impl From<EmployeeIdRepr> for EmployeeId {
    fn from(repr: EmployeeIdRepr) -> Self {
        match repr {
            EmployeeIdRepr::Int(n) => Self(n.to_string()),
            EmployeeIdRepr::Text(s) => Self(s),
        }
    }
}

impl From<EmployeeId> for String {
    fn from(id: EmployeeId) -> Self {
        id.0
    }
}

impl EmployeeId {
    /// Create from any string-like id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The string form used as the override map key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for EmployeeId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for EmployeeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EmployeeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Generate `len` random bytes and hex encode them.
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_is_random_hex() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), TOKEN_BYTES * 2);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_id_debug_is_truncated() {
        let id = SessionId::new("0123456789abcdef");
        let debug = format!("{:?}", id);
        assert!(debug.starts_with("SessionId(01234567"));
        assert!(!debug.contains("89abcdef"));
    }

    #[test]
    fn test_employee_id_from_int_and_string_agree() {
        let from_int: EmployeeId = serde_json::from_str("42").unwrap();
        let from_str: EmployeeId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(from_int, EmployeeId::from(42));
        assert_eq!(from_int.as_str(), "42");
    }

    #[test]
    fn test_employee_id_serializes_as_string() {
        let json = serde_json::to_string(&EmployeeId::from(7)).unwrap();
        assert_eq!(json, "\"7\"");
    }
}
