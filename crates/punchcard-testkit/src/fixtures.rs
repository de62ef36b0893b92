//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use punchcard::{Gate, GateConfig};
use punchcard_core::{now_millis, CookieMeta, EmployeeId, SessionCodec, SessionData, SessionId, SessionUser};
use punchcard_perms::{RawOverride, ACCESS_ADMINS_KEY};
use punchcard_store::{SessionStore, SettingsStore, SqliteStore};

/// A SQLite-backed gate for tests.
pub struct TestFixture {
    pub store: Arc<SqliteStore>,
    pub gate: Gate,
    dir: Option<TempDir>,
}

/// A session written straight to the store, as if the user had logged in.
#[derive(Debug, Clone)]
pub struct LoggedIn {
    pub sid: SessionId,
    pub csrf_token: String,
    /// `Cookie` header value naming the session.
    pub cookie: String,
}

impl TestFixture {
    /// In-memory database, sessions stored as plaintext.
    pub fn new() -> Self {
        Self::build(None, false)
    }

    /// In-memory database, sessions sealed with a key derived from `secret`.
    pub fn encrypted(secret: &str) -> Self {
        Self::build(Some(secret), false)
    }

    /// Database file in a fresh temporary directory.
    pub fn on_disk(secret: Option<&str>) -> Self {
        Self::build(secret, true)
    }

    fn build(secret: Option<&str>, on_disk: bool) -> Self {
        let mut config = GateConfig {
            encryption_secret: secret.map(str::to_owned),
            ..GateConfig::default()
        };
        let codec = SessionCodec::from_secret(secret);

        let (store, dir) = if on_disk {
            let dir = tempfile::tempdir().expect("create temp dir");
            config.database_path = dir.path().join("punchcard.db");
            let store = SqliteStore::open(&config.database_path, codec).expect("open sqlite file");
            (store, Some(dir))
        } else {
            (SqliteStore::open_memory(codec).expect("open in-memory sqlite"), None)
        };

        let store = Arc::new(store);
        let gate = Gate::new(store.clone(), config);
        Self { store, gate, dir }
    }

    /// Path of the database file, for on-disk fixtures.
    pub fn db_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|_| self.gate.config().database_path.clone())
    }

    /// Temporary directory holding the database, for on-disk fixtures.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// `Cookie` header value naming `sid`.
    pub fn cookie(&self, sid: &SessionId) -> String {
        format!("{}={}", self.gate.config().cookie_name, sid.as_str())
    }

    /// Store a live session for `user`, with a CSRF token already issued.
    pub async fn login(&self, user: SessionUser) -> LoggedIn {
        let cookie = CookieMeta::with_max_age(now_millis(), self.gate.config().session_ttl_ms);
        let mut data = SessionData::new(cookie);
        data.user = Some(user);
        let csrf_token = data.ensure_csrf_token().0.to_owned();

        let sid = SessionId::generate();
        self.store.set(&sid, &data).await.expect("store session");
        LoggedIn {
            cookie: self.cookie(&sid),
            sid,
            csrf_token,
        }
    }

    /// Store a live session for a user linked to `employee_id`.
    pub async fn login_employee(&self, employee_id: impl Into<EmployeeId>) -> LoggedIn {
        let employee_id = employee_id.into();
        let user = SessionUser::new(format!("user-{employee_id}")).with_employee(employee_id);
        self.login(user).await
    }

    /// Replace the whole override map with `blob`.
    pub async fn put_access_admins(&self, blob: &str) {
        self.store
            .put_setting(ACCESS_ADMINS_KEY, blob)
            .await
            .expect("write access_admins");
    }

    /// Write one employee's override entry.
    pub async fn set_override(&self, employee_id: impl Into<EmployeeId>, raw: &RawOverride) {
        self.gate
            .resolver()
            .set_employee_override(&employee_id.into(), raw)
            .await
            .expect("write override");
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_is_loadable() {
        let fixture = TestFixture::encrypted("fixture-secret");
        let session = fixture.login_employee(42).await;

        let data = fixture.store.get(&session.sid).await.unwrap().unwrap();
        assert_eq!(data.employee_id(), Some(&EmployeeId::from(42)));
        assert_eq!(data.csrf_token.as_deref(), Some(session.csrf_token.as_str()));
        assert_eq!(session.cookie, format!("punchcard.sid={}", session.sid.as_str()));
    }

    #[tokio::test]
    async fn test_on_disk_fixture_has_file() {
        let fixture = TestFixture::on_disk(None);
        let path = fixture.db_path().unwrap();
        assert!(path.exists());
        assert!(path.starts_with(fixture.dir().unwrap()));
    }

    #[tokio::test]
    async fn test_set_override() {
        let fixture = TestFixture::new();
        fixture
            .set_override(7, &RawOverride {
                view_payroll: Some(true.into()),
                ..RawOverride::default()
            })
            .await;

        let perms = fixture
            .gate
            .resolver()
            .admin_access_perms(&EmployeeId::from(7))
            .await
            .unwrap();
        assert!(perms.view_payroll);
        assert!(perms.modify_payroll);
        assert!(!perms.see_shipments);
    }
}
