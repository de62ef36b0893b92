//! The Gate: shared state behind every middleware in this crate.
//!
//! A [`Gate`] bundles the session store, the access policy resolver, and the
//! configuration. It is cheap to clone and is handed to axum as middleware
//! state.

use std::sync::Arc;
use std::time::Duration;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use punchcard_core::{now_millis, SessionCodec};
use punchcard_perms::{AccessPolicyResolver, Permission, PermissionSet};
use punchcard_store::{SessionStore, SettingsStore, SqliteStore, StoreError};

use crate::auth::AdminGuard;
use crate::config::GateConfig;
use crate::csrf::csrf_guard;
use crate::session::session_layer;

/// Shared state for the session, CSRF, and access gates.
#[derive(Clone)]
pub struct Gate {
    sessions: Arc<dyn SessionStore>,
    resolver: AccessPolicyResolver<dyn SettingsStore>,
    config: Arc<GateConfig>,
}

impl Gate {
    /// Build a gate over a store that holds both sessions and settings.
    pub fn new<S>(store: Arc<S>, config: GateConfig) -> Self
    where
        S: SessionStore + SettingsStore + 'static,
    {
        let sessions: Arc<dyn SessionStore> = store.clone();
        let settings: Arc<dyn SettingsStore> = store;
        Self::from_parts(sessions, settings, config)
    }

    /// Build a gate over separate session and settings stores.
    pub fn from_parts(
        sessions: Arc<dyn SessionStore>,
        settings: Arc<dyn SettingsStore>,
        config: GateConfig,
    ) -> Self {
        Self {
            sessions,
            resolver: AccessPolicyResolver::new(settings),
            config: Arc::new(config),
        }
    }

    /// Open the SQLite database named in `config`.
    pub fn open(config: GateConfig) -> Result<Self, StoreError> {
        let codec = SessionCodec::from_secret(config.encryption_secret.as_deref());
        let store = SqliteStore::open(&config.database_path, codec)?;
        info!(
            path = %config.database_path.display(),
            encrypted = config.encrypts_sessions(),
            "opened session database"
        );
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn resolver(&self) -> &AccessPolicyResolver<dyn SettingsStore> {
        &self.resolver
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Guards
    // ─────────────────────────────────────────────────────────────────────────

    /// Admin guard with the default predicate (`view_payroll`).
    pub fn admin_guard(&self) -> AdminGuard {
        AdminGuard::new(self.resolver.clone())
    }

    /// Admin guard requiring a single permission.
    pub fn admin_guard_requiring(&self, permission: Permission) -> AdminGuard {
        AdminGuard::requiring(self.resolver.clone(), permission)
    }

    /// Admin guard with a custom predicate.
    pub fn admin_guard_with<F>(&self, predicate: F) -> AdminGuard
    where
        F: Fn(&PermissionSet) -> bool + Send + Sync + 'static,
    {
        AdminGuard::with_predicate(self.resolver.clone(), predicate)
    }

    /// Wrap a router with the session layer and the CSRF guard.
    ///
    /// The session layer runs first so the guard sees the loaded session.
    /// Route-level guards (`require_auth`, `require_admin_access`) go on the
    /// router before calling this.
    pub fn protect<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(from_fn(csrf_guard))
            .layer(from_fn_with_state(self.clone(), session_layer))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete every expired session now.
    pub async fn prune_expired(&self) -> Result<usize, StoreError> {
        let removed = self.sessions.prune_expired(now_millis()).await?;
        debug!(removed, "pruned expired sessions");
        Ok(removed)
    }

    /// Prune expired sessions on a fixed interval until the task is aborted.
    ///
    /// Pruning also happens on every session write; this covers deployments
    /// with long idle stretches.
    pub fn spawn_pruner(&self, every: Duration) -> JoinHandle<()> {
        let gate = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(e) = gate.prune_expired().await {
                    warn!(error = %e, "background session prune failed");
                }
            }
        })
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate").field("config", &self.config).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use punchcard_core::{CookieMeta, SessionData, SessionId};
    use punchcard_store::MemoryStore;

    #[tokio::test]
    async fn test_prune_expired_removes_only_dead_sessions() {
        let store = Arc::new(MemoryStore::default());
        let gate = Gate::new(store.clone(), GateConfig::default());
        let now = now_millis();

        let live = SessionData::new(CookieMeta::with_max_age(now, 60_000));
        gate.sessions().set(&SessionId::new("live"), &live).await.unwrap();
        store
            .insert_raw(&SessionId::new("dead"), "{}", Some(now - 1))
            .unwrap();

        assert_eq!(gate.sessions().len().await.unwrap(), 2);
        assert_eq!(gate.prune_expired().await.unwrap(), 1);
        assert!(gate.sessions().get(&SessionId::new("live")).await.unwrap().is_some());
    }

    #[test]
    fn test_open_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = GateConfig {
            database_path: dir.path().join("gate.db"),
            encryption_secret: Some("k".into()),
            ..GateConfig::default()
        };
        let gate = Gate::open(config).unwrap();
        assert!(gate.config().encrypts_sessions());
        assert!(dir.path().join("gate.db").exists());
    }
}
