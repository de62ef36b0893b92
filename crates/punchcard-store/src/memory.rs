//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! (including sealing, lazy expiry, and sweep-on-write) but keeps everything
//! in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use punchcard_core::{now_millis, SessionCodec, SessionData, SessionId};

use crate::error::{Result, StoreError};
use crate::traits::{SessionStore, SettingsStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
    codec: SessionCodec,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Sealed session state indexed by session id.
    sessions: HashMap<SessionId, StoredSession>,

    /// Settings key-value pairs.
    settings: HashMap<String, String>,
}

struct StoredSession {
    sess: String,
    expires_at: Option<i64>,
}

impl StoredSession {
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new(codec: SessionCodec) -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
            codec,
        }
    }

    /// The raw stored text for a session, exactly as it would be persisted.
    pub fn raw(&self, sid: &SessionId) -> Option<String> {
        self.read()
            .ok()?
            .sessions
            .get(sid)
            .map(|s| s.sess.clone())
    }

    /// Insert a raw record without sealing or sweeping.
    pub fn insert_raw(&self, sid: &SessionId, sess: &str, expires_at: Option<i64>) -> Result<()> {
        self.write()?.sessions.insert(
            sid.clone(),
            StoredSession {
                sess: sess.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(SessionCodec::plaintext())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, sid: &SessionId) -> Result<Option<SessionData>> {
        let mut inner = self.write()?;

        let live = match inner.sessions.get(sid) {
            None => return Ok(None),
            Some(stored) if stored.is_expired(now_millis()) => None,
            Some(stored) => Some(stored.sess.clone()),
        };
        let Some(sess) = live else {
            inner.sessions.remove(sid);
            return Ok(None);
        };
        drop(inner);

        Ok(self.codec.decode(&sess))
    }

    async fn set(&self, sid: &SessionId, session: &SessionData) -> Result<()> {
        let sess = self.codec.encode(session)?;
        let mut inner = self.write()?;

        inner.sessions.insert(
            sid.clone(),
            StoredSession {
                sess,
                expires_at: session.expires_at(),
            },
        );

        let now = now_millis();
        inner.sessions.retain(|_, s| !s.is_expired(now));
        Ok(())
    }

    async fn touch(&self, sid: &SessionId, session: &SessionData) -> Result<bool> {
        let sess = self.codec.encode(session)?;
        let mut inner = self.write()?;

        match inner.sessions.get_mut(sid) {
            Some(stored) => {
                stored.sess = sess;
                stored.expires_at = session.expires_at();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn destroy(&self, sid: &SessionId) -> Result<()> {
        self.write()?.sessions.remove(sid);
        Ok(())
    }

    async fn prune_expired(&self, now: i64) -> Result<usize> {
        let mut inner = self.write()?;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| !s.is_expired(now));
        Ok(before - inner.sessions.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.read()?.sessions.len())
    }

    async fn clear(&self) -> Result<()> {
        self.write()?.sessions.clear();
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.settings.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        self.write()?
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use punchcard_core::{CookieMeta, SealKey, SessionUser};

    fn live_session() -> SessionData {
        let mut session = SessionData::new(CookieMeta::with_max_age(now_millis(), 60_000));
        session.user = Some(SessionUser::new("9").with_username("ada"));
        session
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new(SessionCodec::with_key(SealKey::generate()));
        let sid = SessionId::generate();
        let session = live_session();

        store.set(&sid, &session).await.unwrap();
        assert_eq!(store.get(&sid).await.unwrap(), Some(session));
        assert!(store.raw(&sid).unwrap().starts_with("v1:"));
    }

    #[tokio::test]
    async fn test_shadowing_extra_key_is_refused_not_lost() {
        let store = MemoryStore::default();
        let sid = SessionId::generate();
        let session = live_session();
        store.set(&sid, &session).await.unwrap();

        for key in punchcard_core::RESERVED_KEYS {
            let mut shadowed = session.clone();
            shadowed
                .extra
                .insert(key.to_string(), serde_json::json!("display-name"));
            assert!(matches!(
                store.set(&sid, &shadowed).await,
                Err(StoreError::Encoding(_))
            ));
        }
        assert_eq!(store.get(&sid).await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_expired_get_removes_entry() {
        let store = MemoryStore::default();
        let sid = SessionId::generate();
        store.insert_raw(&sid, "{}", Some(now_millis() - 1)).unwrap();

        assert_eq!(store.get(&sid).await.unwrap(), None);
        assert!(store.raw(&sid).is_none());
    }

    #[tokio::test]
    async fn test_set_sweeps_expired() {
        let store = MemoryStore::default();
        let stale = SessionId::generate();
        store.insert_raw(&stale, "{}", Some(1)).unwrap();

        store.set(&SessionId::generate(), &live_session()).await.unwrap();
        assert!(store.raw(&stale).is_none());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_touch_does_not_insert() {
        let store = MemoryStore::default();
        let sid = SessionId::generate();
        assert!(!store.touch(&sid, &live_session()).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_destroy_idempotent() {
        let store = MemoryStore::default();
        let sid = SessionId::generate();
        store.set(&sid, &live_session()).await.unwrap();
        store.destroy(&sid).await.unwrap();
        store.destroy(&sid).await.unwrap();
        assert_eq!(store.get(&sid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prune_expired_counts() {
        let store = MemoryStore::default();
        store.insert_raw(&SessionId::generate(), "{}", Some(10)).unwrap();
        store.insert_raw(&SessionId::generate(), "{}", Some(20)).unwrap();
        store.insert_raw(&SessionId::generate(), "{}", None).unwrap();

        assert_eq!(store.prune_expired(15).await.unwrap(), 1);
        assert_eq!(store.prune_expired(i64::MAX).await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_settings() {
        let store = MemoryStore::default();
        assert_eq!(store.get_setting("k").await.unwrap(), None);
        store.put_setting("k", "v").await.unwrap();
        assert_eq!(store.get_setting("k").await.unwrap().as_deref(), Some("v"));
    }
}
