//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend for Punchcard. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use punchcard_core::{now_millis, SessionCodec, SessionData, SessionId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{SessionStore, SettingsStore};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
    /// Seals session state on the way in, opens it on the way out.
    codec: SessionCodec,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>, codec: SessionCodec) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            codec,
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory(codec: SessionCodec) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            codec,
        })
    }

    /// The codec sessions are stored with.
    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    /// Run a closure against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&conn)
        })
        .await?
    }
}

/// Delete every expired session row.
fn sweep_expired(conn: &Connection, now: i64) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at IS NOT NULL AND expires_at <= ?1",
        params![now],
    )?;
    Ok(removed)
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn get(&self, sid: &SessionId) -> Result<Option<SessionData>> {
        let sid = sid.clone();

        let stored = self
            .blocking(move |conn| {
                let row: Option<(String, Option<i64>)> = conn
                    .query_row(
                        "SELECT sess, expires_at FROM sessions WHERE sid = ?1",
                        params![sid.as_str()],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                match row {
                    Some((_, Some(expires_at))) if expires_at <= now_millis() => {
                        conn.execute("DELETE FROM sessions WHERE sid = ?1", params![sid.as_str()])?;
                        debug!(%sid, expires_at, "expired session removed on read");
                        Ok(None)
                    }
                    Some((sess, _)) => Ok(Some(sess)),
                    None => Ok(None),
                }
            })
            .await?;

        Ok(stored.and_then(|sess| self.codec.decode(&sess)))
    }

    async fn set(&self, sid: &SessionId, session: &SessionData) -> Result<()> {
        let sid = sid.clone();
        let sess = self.codec.encode(session)?;
        let expires_at = session.expires_at();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO sessions (sid, sess, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(sid) DO UPDATE SET sess = excluded.sess, expires_at = excluded.expires_at",
                params![sid.as_str(), sess, expires_at],
            )?;

            let pruned = sweep_expired(conn, now_millis())?;
            debug!(%sid, pruned, "session stored");
            Ok(())
        })
        .await
    }

    async fn touch(&self, sid: &SessionId, session: &SessionData) -> Result<bool> {
        let sid = sid.clone();
        let sess = self.codec.encode(session)?;
        let expires_at = session.expires_at();

        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE sessions SET sess = ?2, expires_at = ?3 WHERE sid = ?1",
                params![sid.as_str(), sess, expires_at],
            )?;
            Ok(updated > 0)
        })
        .await
    }

    async fn destroy(&self, sid: &SessionId) -> Result<()> {
        let sid = sid.clone();

        self.blocking(move |conn| {
            conn.execute("DELETE FROM sessions WHERE sid = ?1", params![sid.as_str()])?;
            debug!(%sid, "session destroyed");
            Ok(())
        })
        .await
    }

    async fn prune_expired(&self, now: i64) -> Result<usize> {
        self.blocking(move |conn| sweep_expired(conn, now)).await
    }

    async fn len(&self) -> Result<usize> {
        self.blocking(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.blocking(|conn| {
            conn.execute("DELETE FROM sessions", [])?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();

        self.blocking(move |conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now_millis()],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use punchcard_core::{CookieMeta, SealKey, SessionUser};
    use serde_json::json;

    fn live_session() -> SessionData {
        let mut session = SessionData::new(CookieMeta::with_max_age(now_millis(), 60_000));
        session.user = Some(SessionUser::new("1").with_employee(42));
        session
    }

    fn expired_session() -> SessionData {
        SessionData::new(CookieMeta {
            expires: Some(now_millis() - 1_000),
            original_max_age: Some(60_000),
        })
    }

    fn store() -> SqliteStore {
        SqliteStore::open_memory(SessionCodec::with_key(SealKey::generate())).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = store();
        let sid = SessionId::generate();
        let session = live_session();

        store.set(&sid, &session).await.unwrap();
        assert_eq!(store.get(&sid).await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_get_absent() {
        let store = store();
        assert_eq!(store.get(&SessionId::generate()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_replaces() {
        let store = store();
        let sid = SessionId::generate();

        store.set(&sid, &live_session()).await.unwrap();
        let mut updated = live_session();
        updated.extra.insert("theme".into(), json!("dark"));
        store.set(&sid, &updated).await.unwrap();

        assert_eq!(store.get(&sid).await.unwrap(), Some(updated));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_get_removes_row() {
        let store = store();
        let sid = SessionId::generate();

        // Bypass `set`, which would sweep the row immediately.
        let sess = store.codec().encode(&expired_session()).unwrap();
        let expires_at = expired_session().expires_at();
        let raw_sid = sid.clone();
        store
            .blocking(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (sid, sess, expires_at) VALUES (?1, ?2, ?3)",
                    params![raw_sid.as_str(), sess, expires_at],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(store.len().await.unwrap(), 1);

        assert_eq!(store.get(&sid).await.unwrap(), None);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_sweeps_other_expired_rows() {
        let store = store();
        let stale = SessionId::generate();
        let fresh = SessionId::generate();

        store.set(&fresh, &live_session()).await.unwrap();
        // A row that expired long ago, written without going through `set`.
        let stale_sid = stale.clone();
        store
            .blocking(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (sid, sess, expires_at) VALUES (?1, '{}', 1)",
                    params![stale_sid.as_str()],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(store.len().await.unwrap(), 2);

        store.set(&SessionId::generate(), &live_session()).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 2);
        assert!(store.get(&fresh).await.unwrap().is_some());
        assert!(store.get(&stale).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_without_expiry_persists() {
        let store = store();
        let sid = SessionId::generate();
        let session = SessionData::default();

        store.set(&sid, &session).await.unwrap();
        assert_eq!(store.prune_expired(i64::MAX).await.unwrap(), 0);
        assert_eq!(store.get(&sid).await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_touch_only_updates_existing() {
        let store = store();
        let sid = SessionId::generate();

        assert!(!store.touch(&sid, &live_session()).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 0);

        store.set(&sid, &live_session()).await.unwrap();
        let mut refreshed = live_session();
        refreshed.cookie.refresh(now_millis() + 30_000);
        assert!(store.touch(&sid, &refreshed).await.unwrap());
        assert_eq!(store.get(&sid).await.unwrap(), Some(refreshed));
    }

    #[tokio::test]
    async fn test_destroy_idempotent() {
        let store = store();
        let sid = SessionId::generate();

        store.set(&sid, &live_session()).await.unwrap();
        store.destroy(&sid).await.unwrap();
        store.destroy(&sid).await.unwrap();
        assert_eq!(store.get(&sid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_undecryptable_row_reads_as_absent() {
        let sid = SessionId::generate();
        let writer = store();
        writer.set(&sid, &live_session()).await.unwrap();

        // Same database, different key.
        let reader = SqliteStore {
            conn: writer.conn.clone(),
            codec: SessionCodec::with_key(SealKey::generate()),
        };
        assert_eq!(reader.get(&sid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = store();
        store.set(&SessionId::generate(), &live_session()).await.unwrap();
        store.set(&SessionId::generate(), &live_session()).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let store = store();
        assert_eq!(store.get_setting("access_admins").await.unwrap(), None);

        store.put_setting("access_admins", "{}").await.unwrap();
        store.put_setting("access_admins", r#"{"42":{}}"#).await.unwrap();
        assert_eq!(
            store.get_setting("access_admins").await.unwrap().as_deref(),
            Some(r#"{"42":{}}"#)
        );
    }
}
