//! Route guards: plain authentication and admin capability checks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use punchcard_perms::{AccessPolicyResolver, Permission, PermissionSet};
use punchcard_store::SettingsStore;

use crate::error::{GateError, Result};
use crate::session::SessionHandle;

/// Decides whether a resolved permission set may pass an admin gate.
pub type PermissionPredicate = Arc<dyn Fn(&PermissionSet) -> bool + Send + Sync>;

/// Middleware rejecting requests without an authenticated session (401).
pub async fn require_auth(req: Request, next: Next) -> Response {
    let authenticated = req
        .extensions()
        .get::<SessionHandle>()
        .is_some_and(SessionHandle::is_authenticated);
    if !authenticated {
        return GateError::Unauthenticated.into_response();
    }
    next.run(req).await
}

/// State for [`require_admin_access`].
#[derive(Clone)]
pub struct AdminGuard {
    resolver: AccessPolicyResolver<dyn SettingsStore>,
    predicate: PermissionPredicate,
}

impl AdminGuard {
    /// Guard requiring `view_payroll`.
    pub fn new(resolver: AccessPolicyResolver<dyn SettingsStore>) -> Self {
        Self::requiring(resolver, Permission::ViewPayroll)
    }

    /// Guard requiring a single permission.
    pub fn requiring(
        resolver: AccessPolicyResolver<dyn SettingsStore>,
        permission: Permission,
    ) -> Self {
        Self::with_predicate(resolver, move |perms| perms.allows(permission))
    }

    /// Guard with an arbitrary predicate.
    pub fn with_predicate<F>(
        resolver: AccessPolicyResolver<dyn SettingsStore>,
        predicate: F,
    ) -> Self
    where
        F: Fn(&PermissionSet) -> bool + Send + Sync + 'static,
    {
        Self {
            resolver,
            predicate: Arc::new(predicate),
        }
    }

    /// Run the admin checks against a session.
    ///
    /// 401 without identity, 403 without an employee link, 500 if resolution
    /// fails or the predicate panics, 403 if the predicate says no.
    pub async fn check(&self, session: Option<&SessionHandle>) -> Result<PermissionSet> {
        let Some(session) = session.filter(|s| s.is_authenticated()) else {
            return Err(GateError::Unauthenticated);
        };
        let Some(employee_id) = session.employee_id() else {
            return Err(GateError::NoEmployeeLink);
        };

        let perms = self.resolver.admin_access_perms(&employee_id).await?;

        let allowed = catch_unwind(AssertUnwindSafe(|| (self.predicate)(&perms)))
            .map_err(|_| GateError::PredicatePanicked)?;
        if !allowed {
            warn!(%employee_id, ?perms, "admin access denied");
            return Err(GateError::Forbidden);
        }

        debug!(%employee_id, "admin access granted");
        Ok(perms)
    }
}

impl std::fmt::Debug for AdminGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGuard").finish_non_exhaustive()
    }
}

/// Middleware gating a route on admin capabilities.
///
/// On success the resolved [`PermissionSet`] is added to the request
/// extensions for the handler (`Extension<PermissionSet>`).
pub async fn require_admin_access(
    State(guard): State<AdminGuard>,
    mut req: Request,
    next: Next,
) -> Response {
    let session = req.extensions().get::<SessionHandle>().cloned();
    match guard.check(session.as_ref()).await {
        Ok(perms) => {
            req.extensions_mut().insert(perms);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use punchcard_core::{SessionData, SessionId, SessionUser};
    use punchcard_perms::ACCESS_ADMINS_KEY;
    use punchcard_store::MemoryStore;

    async fn resolver(blob: Option<&str>) -> AccessPolicyResolver<dyn SettingsStore> {
        let store = MemoryStore::default();
        if let Some(blob) = blob {
            store.put_setting(ACCESS_ADMINS_KEY, blob).await.unwrap();
        }
        let store: Arc<dyn SettingsStore> = Arc::new(store);
        AccessPolicyResolver::new(store)
    }

    fn session(user: Option<SessionUser>) -> SessionHandle {
        let data = SessionData {
            user,
            ..SessionData::default()
        };
        SessionHandle::existing(SessionId::new("s"), data)
    }

    fn status(result: Result<PermissionSet>) -> StatusCode {
        match result {
            Ok(_) => StatusCode::OK,
            Err(e) => e.status(),
        }
    }

    #[tokio::test]
    async fn test_no_session_is_401() {
        let guard = AdminGuard::new(resolver(None).await);
        assert_eq!(status(guard.check(None).await), StatusCode::UNAUTHORIZED);
        assert_eq!(status(guard.check(Some(&session(None))).await), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_no_employee_link_is_403() {
        let guard = AdminGuard::new(resolver(None).await);
        let s = session(Some(SessionUser::new("u1")));
        assert!(matches!(guard.check(Some(&s)).await, Err(GateError::NoEmployeeLink)));
    }

    #[tokio::test]
    async fn test_default_predicate_uses_view_payroll() {
        let guard = AdminGuard::new(resolver(Some(r#"{"9": {"view_payroll": false}}"#)).await);

        let allowed = session(Some(SessionUser::new("u1").with_employee(1)));
        assert_eq!(guard.check(Some(&allowed)).await.unwrap(), PermissionSet::DEFAULT);

        let denied = session(Some(SessionUser::new("u9").with_employee(9)));
        assert!(matches!(guard.check(Some(&denied)).await, Err(GateError::Forbidden)));
    }

    #[tokio::test]
    async fn test_custom_predicate() {
        let guard = AdminGuard::requiring(resolver(None).await, Permission::ModifyPayRates);
        let s = session(Some(SessionUser::new("u1").with_employee(1)));
        assert_eq!(status(guard.check(Some(&s)).await), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_panicking_predicate_fails_closed() {
        let guard = AdminGuard::with_predicate(resolver(None).await, |_| panic!("boom"));
        let s = session(Some(SessionUser::new("u1").with_employee(1)));
        assert!(matches!(
            guard.check(Some(&s)).await,
            Err(GateError::PredicatePanicked)
        ));
    }
}
