//! CSRF protection.
//!
//! Every session carries one token, minted on first sight and stable for
//! the session's lifetime. The token is echoed in the `x-csrf-token`
//! response header on every response.
//!
//! Unsafe requests from an authenticated session pass when **either**
//!
//! - a `x-csrf-token` (or `x-xsrf-token`) request header equals the
//!   session's token, or
//! - the `Origin` header (falling back to `Referer`) names the same host as
//!   the request's `Host` header.
//!
//! The origin fallback admits plain form posts from the app's own pages.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;
use url::Url;

use crate::error::GateError;
use crate::session::SessionHandle;

/// Response header carrying the session's token.
pub static CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

/// Request headers checked for a caller-supplied token, in order.
pub const CSRF_REQUEST_HEADERS: [&str; 2] = ["x-csrf-token", "x-xsrf-token"];

/// Why a request was let through or stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfOutcome {
    /// GET, HEAD, or OPTIONS.
    SafeMethod,
    /// No authenticated identity; nothing to forge.
    Anonymous,
    /// Header token equals the session token.
    TokenMatched,
    /// Origin or Referer names the request's own host.
    SameOrigin,
    /// Neither check passed.
    Rejected,
}

impl CsrfOutcome {
    pub fn is_allowed(self) -> bool {
        !matches!(self, CsrfOutcome::Rejected)
    }
}

pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Decide a request against the session's token.
pub fn evaluate(
    method: &Method,
    headers: &HeaderMap,
    session_token: &str,
    authenticated: bool,
) -> CsrfOutcome {
    if is_safe_method(method) {
        return CsrfOutcome::SafeMethod;
    }
    if !authenticated {
        return CsrfOutcome::Anonymous;
    }
    if header_token(headers).is_some_and(|t| tokens_match(t, session_token)) {
        return CsrfOutcome::TokenMatched;
    }
    if same_origin(headers) {
        return CsrfOutcome::SameOrigin;
    }
    CsrfOutcome::Rejected
}

fn header_token(headers: &HeaderMap) -> Option<&str> {
    CSRF_REQUEST_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .find(|token| !token.is_empty())
}

/// Constant-time comparison: equal-length digests compared by `blake3::Hash`.
fn tokens_match(supplied: &str, expected: &str) -> bool {
    !expected.is_empty() && blake3::hash(supplied.as_bytes()) == blake3::hash(expected.as_bytes())
}

/// Whether `Origin` (or, without one, `Referer`) names the request's host.
pub fn same_origin(headers: &HeaderMap) -> bool {
    let Some(host) = header_str(headers, "host") else {
        return false;
    };
    let source = header_str(headers, "origin").or_else(|| header_str(headers, "referer"));
    source
        .and_then(origin_host)
        .is_some_and(|origin| origin.eq_ignore_ascii_case(host))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `host[:port]` of an http(s) URL, with the port only when explicit.
fn origin_host(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

/// Middleware issuing and validating CSRF tokens.
///
/// Must run inside [`crate::session::session_layer`]. Without a session
/// there is no identity to protect and the request passes untouched.
pub async fn csrf_guard(req: Request, next: Next) -> Response {
    let Some(session) = req.extensions().get::<SessionHandle>().cloned() else {
        return next.run(req).await;
    };

    let token = session.ensure_csrf_token();
    let outcome = evaluate(
        req.method(),
        req.headers(),
        &token,
        session.is_authenticated(),
    );

    let mut response = if outcome.is_allowed() {
        next.run(req).await
    } else {
        warn!(
            method = %req.method(),
            path = %req.uri().path(),
            sid = %session.id(),
            "CSRF validation failed"
        );
        GateError::CsrfRejected.into_response()
    };

    if let Ok(value) = HeaderValue::from_str(&token) {
        response.headers_mut().insert(&CSRF_HEADER, value);
    }
    response
}
