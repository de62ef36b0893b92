//! Configuration for the session and access gates.

use std::path::PathBuf;

use anyhow::Context;

/// Environment variable holding the session encryption secret.
pub const ENV_ENCRYPTION_KEY: &str = "SESSION_ENCRYPTION_KEY";
/// Environment variable holding the SQLite database path.
pub const ENV_DB_PATH: &str = "PUNCHCARD_DB_PATH";
/// Environment variable holding the session lifetime in hours.
pub const ENV_TTL_HOURS: &str = "SESSION_TTL_HOURS";
/// Environment variable overriding the session cookie name.
pub const ENV_COOKIE_NAME: &str = "SESSION_COOKIE_NAME";
/// Environment variable marking the session cookie `Secure`.
pub const ENV_COOKIE_SECURE: &str = "SESSION_COOKIE_SECURE";

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Configuration for [`crate::Gate`].
#[derive(Clone)]
pub struct GateConfig {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Secret the sealing key is derived from, used exactly as given. `None`
    /// (or an all-whitespace value) stores sessions in plaintext.
    pub encryption_secret: Option<String>,
    /// Session lifetime in milliseconds.
    pub session_ttl_ms: i64,
    /// Name of the session cookie.
    pub cookie_name: String,
    /// Whether the cookie carries the `Secure` attribute.
    pub cookie_secure: bool,
    /// Refresh the expiry of unchanged sessions on every request.
    pub rolling: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("punchcard.db"),
            encryption_secret: None,
            session_ttl_ms: 8 * HOUR_MS,
            cookie_name: "punchcard.sid".to_string(),
            cookie_secure: false,
            rolling: true,
        }
    }
}

impl GateConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup, unset keys falling
    /// back to [`GateConfig::default`].
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        config.encryption_secret = lookup(ENV_ENCRYPTION_KEY).filter(|s| !s.trim().is_empty());

        if let Some(hours) = lookup(ENV_TTL_HOURS) {
            let hours: i64 = hours
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TTL_HOURS} must be an integer, got {hours:?}"))?;
            anyhow::ensure!(hours > 0, "{ENV_TTL_HOURS} must be positive, got {hours}");
            config.session_ttl_ms = hours.saturating_mul(HOUR_MS);
        }

        if let Some(name) = lookup(ENV_COOKIE_NAME).filter(|n| !n.is_empty()) {
            anyhow::ensure!(
                name.chars().all(|c| c.is_ascii_graphic() && !matches!(c, ';' | '=' | ',')),
                "{ENV_COOKIE_NAME} is not a valid cookie name: {name:?}"
            );
            config.cookie_name = name;
        }

        if let Some(secure) = lookup(ENV_COOKIE_SECURE) {
            config.cookie_secure = matches!(secure.trim(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Whether sessions will be sealed at rest.
    pub fn encrypts_sessions(&self) -> bool {
        self.encryption_secret.is_some()
    }
}

impl std::fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateConfig")
            .field("database_path", &self.database_path)
            .field(
                "encryption_secret",
                &self.encryption_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("session_ttl_ms", &self.session_ttl_ms)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_secure", &self.cookie_secure)
            .field("rolling", &self.rolling)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = GateConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.cookie_name, "punchcard.sid");
        assert_eq!(config.session_ttl_ms, 8 * HOUR_MS);
        assert!(!config.encrypts_sessions());
        assert!(config.rolling);
    }

    #[test]
    fn test_reads_all_keys() {
        let config = GateConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/var/lib/punchcard/app.db"),
            (ENV_ENCRYPTION_KEY, "s3cret"),
            (ENV_TTL_HOURS, "2"),
            (ENV_COOKIE_NAME, "sid"),
            (ENV_COOKIE_SECURE, "true"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/punchcard/app.db"));
        assert_eq!(config.encryption_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.session_ttl_ms, 2 * HOUR_MS);
        assert_eq!(config.cookie_name, "sid");
        assert!(config.cookie_secure);
    }

    #[test]
    fn test_blank_secret_disables_encryption() {
        let config = GateConfig::from_lookup(lookup(&[(ENV_ENCRYPTION_KEY, "  ")])).unwrap();
        assert!(!config.encrypts_sessions());
    }

    #[test]
    fn test_secret_is_not_trimmed() {
        let config = GateConfig::from_lookup(lookup(&[(ENV_ENCRYPTION_KEY, " s3cret\n")])).unwrap();
        assert_eq!(config.encryption_secret.as_deref(), Some(" s3cret\n"));
    }

    #[test]
    fn test_invalid_ttl_is_error() {
        assert!(GateConfig::from_lookup(lookup(&[(ENV_TTL_HOURS, "eight")])).is_err());
        assert!(GateConfig::from_lookup(lookup(&[(ENV_TTL_HOURS, "0")])).is_err());
    }

    #[test]
    fn test_invalid_cookie_name_is_error() {
        assert!(GateConfig::from_lookup(lookup(&[(ENV_COOKIE_NAME, "a;b")])).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = GateConfig {
            encryption_secret: Some("hunter2".into()),
            ..GateConfig::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
