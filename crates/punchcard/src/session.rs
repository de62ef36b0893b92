//! Session transport: cookie in, store lookup, handler, store write, cookie out.
//!
//! [`session_layer`] loads the session named by the request cookie and hands
//! handlers a [`SessionHandle`]. After the handler returns, the handle's
//! flags decide what reaches the store:
//!
//! | state                     | store call | `Set-Cookie`      |
//! |---------------------------|------------|-------------------|
//! | destroyed                 | `destroy`  | cleared           |
//! | modified                  | `set`      | if new or rolling |
//! | unmodified, existing      | `touch`    | if rolling        |
//! | unmodified, new           | none       | none              |

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use punchcard_core::{
    now_millis, CookieMeta, CoreError, EmployeeId, Result as CoreResult, SessionData, SessionId,
    SessionUser,
};

use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::gate::Gate;

#[derive(Debug, Clone)]
struct SessionSlot {
    id: SessionId,
    data: SessionData,
    is_new: bool,
    modified: bool,
    destroyed: bool,
    /// Id replaced by [`SessionHandle::login`], deleted on commit.
    superseded: Option<SessionId>,
}

/// Request-scoped view of the current session.
///
/// Cloning is cheap; clones share state. Extract it in a handler with
/// `session: SessionHandle`.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<SessionSlot>>,
}

impl SessionHandle {
    /// A session loaded from the store.
    pub fn existing(id: SessionId, data: SessionData) -> Self {
        Self::from_slot(SessionSlot {
            id,
            data,
            is_new: false,
            modified: false,
            destroyed: false,
            superseded: None,
        })
    }

    /// A fresh session under a newly generated id.
    pub fn fresh(data: SessionData) -> Self {
        Self::from_slot(SessionSlot {
            id: SessionId::generate(),
            data,
            is_new: true,
            modified: false,
            destroyed: false,
            superseded: None,
        })
    }

    fn from_slot(slot: SessionSlot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(slot)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionSlot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> SessionId {
        self.lock().id.clone()
    }

    pub fn is_new(&self) -> bool {
        self.lock().is_new
    }

    pub fn is_modified(&self) -> bool {
        self.lock().modified
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Copy of the current session state.
    pub fn data(&self) -> SessionData {
        self.lock().data.clone()
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.lock().data.user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        let slot = self.lock();
        !slot.destroyed && slot.data.is_authenticated()
    }

    pub fn employee_id(&self) -> Option<EmployeeId> {
        self.lock().data.employee_id().cloned()
    }

    /// Attach an authenticated identity.
    ///
    /// An existing session is moved to a new id; the old record is deleted
    /// when the response is committed.
    pub fn login(&self, user: SessionUser) {
        let mut slot = self.lock();
        if !slot.is_new {
            let old = std::mem::replace(&mut slot.id, SessionId::generate());
            slot.superseded = Some(old);
            slot.is_new = true;
        }
        slot.data.user = Some(user);
        slot.destroyed = false;
        slot.modified = true;
    }

    /// Destroy the session. The record is deleted and the cookie cleared.
    pub fn logout(&self) {
        let mut slot = self.lock();
        slot.data.user = None;
        slot.destroyed = true;
    }

    /// The session's CSRF token, if one was issued.
    pub fn csrf_token(&self) -> Option<String> {
        self.lock().data.csrf_token.clone()
    }

    /// The session's CSRF token, minting one if it has none.
    pub fn ensure_csrf_token(&self) -> String {
        let mut slot = self.lock();
        let (token, minted) = slot.data.ensure_csrf_token();
        let token = token.to_owned();
        if minted {
            slot.modified = true;
        }
        token
    }

    /// Read an application value stored in the session.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.lock().data.extra.get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(key, error = %e, "session value has unexpected shape");
                None
            }
        }
    }

    /// Store an application value in the session.
    ///
    /// Fails for values that do not serialize and for the keys of built-in
    /// fields (`cookie`, `user`, `csrfToken`). The session is left unchanged
    /// on failure.
    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> CoreResult<()> {
        let value =
            serde_json::to_value(value).map_err(|e| CoreError::EncodingError(e.to_string()))?;
        let mut slot = self.lock();
        slot.data.insert_extra(key, value)?;
        slot.modified = true;
        Ok(())
    }

    /// Remove an application value from the session.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut slot = self.lock();
        let removed = slot.data.extra.remove(key);
        if removed.is_some() {
            slot.modified = true;
        }
        removed
    }

    fn snapshot(&self) -> SessionSlot {
        self.lock().clone()
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or(GateError::MissingSessionLayer)
    }
}

/// Middleware that loads and persists the session around each request.
///
/// Install with `axum::middleware::from_fn_with_state(gate, session_layer)`
/// or [`Gate::protect`]. A storage failure on either side of the handler
/// ends the request with a 500.
pub async fn session_layer(State(gate): State<Gate>, mut req: Request, next: Next) -> Response {
    let cookie_sid = session_cookie(req.headers(), &gate.config().cookie_name);
    let handle = match load(&gate, cookie_sid.as_ref()).await {
        Ok(handle) => handle,
        Err(e) => return e.into_response(),
    };

    req.extensions_mut().insert(handle.clone());
    let mut response = next.run(req).await;

    match commit(&gate, &handle, cookie_sid.is_some()).await {
        Ok(Some(cookie)) => {
            response.headers_mut().append(SET_COOKIE, cookie);
            response
        }
        Ok(None) => response,
        Err(e) => e.into_response(),
    }
}

async fn load(gate: &Gate, cookie_sid: Option<&SessionId>) -> Result<SessionHandle> {
    if let Some(sid) = cookie_sid {
        if let Some(data) = gate.sessions().get(sid).await? {
            return Ok(SessionHandle::existing(sid.clone(), data));
        }
        debug!(%sid, "session cookie names no live session");
    }
    let now = now_millis();
    let cookie = CookieMeta::with_max_age(now, gate.config().session_ttl_ms);
    Ok(SessionHandle::fresh(SessionData::new(cookie)))
}

/// Write the session back and return the `Set-Cookie` value to send, if any.
async fn commit(gate: &Gate, handle: &SessionHandle, had_cookie: bool) -> Result<Option<HeaderValue>> {
    let config = gate.config();
    let store = gate.sessions();
    let mut slot = handle.snapshot();

    if let Some(old) = &slot.superseded {
        store.destroy(old).await?;
    }

    if slot.destroyed {
        if !slot.is_new {
            store.destroy(&slot.id).await?;
        }
        return if had_cookie {
            header_value(&clear_cookie(config)).map(Some)
        } else {
            Ok(None)
        };
    }

    let now = now_millis();
    if config.rolling {
        slot.data.cookie.refresh(now);
    }

    if slot.modified {
        store.set(&slot.id, &slot.data).await?;
    } else if slot.is_new {
        return Ok(None);
    } else if config.rolling && !store.touch(&slot.id, &slot.data).await? {
        warn!(sid = %slot.id, "session disappeared before touch");
    }

    if slot.is_new || config.rolling {
        let cookie = session_cookie_value(config, &slot.id, slot.data.expires_at(), now);
        return header_value(&cookie).map(Some);
    }
    Ok(None)
}

/// Find the session id in the request's `Cookie` headers.
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<SessionId> {
    let jar = CookieJar::from_headers(headers);
    jar.get(name)
        .map(Cookie::value_trimmed)
        .filter(|value| !value.is_empty())
        .map(SessionId::new)
}

fn base_cookie(config: &GateConfig, value: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .build()
}

/// Cookie issuing `sid`. Without an expiry it is a browser-session cookie.
pub fn session_cookie_value(
    config: &GateConfig,
    sid: &SessionId,
    expires_at: Option<i64>,
    now: i64,
) -> Cookie<'static> {
    let mut cookie = base_cookie(config, sid.as_str().to_owned());
    if let Some(at) = expires_at {
        cookie.set_max_age(Duration::seconds(at.saturating_sub(now).max(0) / 1000));
    }
    cookie
}

/// Cookie that deletes the session cookie.
pub fn clear_cookie(config: &GateConfig) -> Cookie<'static> {
    let mut cookie = base_cookie(config, String::new());
    cookie.set_max_age(Duration::ZERO);
    cookie
}

fn header_value(cookie: &Cookie<'_>) -> Result<HeaderValue> {
    Ok(HeaderValue::from_str(&cookie.to_string())?)
}
