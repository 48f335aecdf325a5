//! Session-cookie authentication in front of the protected routes.
//!
//! Signs/verifies once with a cached secret, compares in constant time via
//! [`subtle`], and falls back to open access when no password is configured
//! (dev mode). `spec.md` §6 names session cookies rather than bearer
//! tokens, so the session is carried as a signed `Set-Cookie` value instead
//! of an `Authorization` header.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

const COOKIE_NAME: &str = "wre_session";
/// Sessions are bearer-of-cookie, not expiring mid-run: a signed cookie is
/// valid for 30 days of wall-clock time from issuance.
const SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Verifies login passwords and signs/verifies session cookies.
///
/// When `app_password` is `None` (`APP_PASSWORD` unset) every request is
/// treated as authenticated — a dev-mode fallback for local runs with no
/// credential configured.
#[derive(Clone)]
pub struct SessionAuth {
    app_password: Option<String>,
    session_secret: Vec<u8>,
    cookie_secure: bool,
}

impl SessionAuth {
    #[must_use]
    pub fn new(app_password: Option<String>, session_secret: String, cookie_secure: bool) -> Self {
        Self {
            app_password,
            session_secret: session_secret.into_bytes(),
            cookie_secure,
        }
    }

    /// Dev-mode instance with no password gate, for tests and local runs
    /// without `APP_PASSWORD` configured.
    #[must_use]
    pub fn open() -> Self {
        Self {
            app_password: None,
            session_secret: b"wre-dev-session-secret".to_vec(),
            cookie_secure: false,
        }
    }

    #[must_use]
    pub fn requires_password(&self) -> bool {
        self.app_password.is_some()
    }

    /// Constant-time password check against the configured `APP_PASSWORD`.
    /// Always succeeds when no password is configured.
    #[must_use]
    pub fn verify_password(&self, candidate: &str) -> bool {
        match &self.app_password {
            None => true,
            Some(expected) => {
                let a = Sha256::digest(expected.as_bytes());
                let b = Sha256::digest(candidate.as_bytes());
                bool::from(a.as_slice().ct_eq(b.as_slice()))
            }
        }
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.session_secret)
            .expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Build the `Set-Cookie` header value for a freshly authenticated
    /// session.
    #[must_use]
    pub fn issue_cookie(&self) -> HeaderValue {
        let issued_at = wre_core::time::now_unix_seconds();
        let payload = issued_at.to_string();
        let signature = self.sign(&payload);
        let token = URL_SAFE_NO_PAD.encode(format!("{payload}.{signature}"));
        let attrs = self.cookie_attrs();
        HeaderValue::from_str(&format!("{COOKIE_NAME}={token}; {attrs}"))
            .unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    /// Build the `Set-Cookie` header value that clears the session cookie.
    #[must_use]
    pub fn clear_cookie(&self) -> HeaderValue {
        let attrs = self.cookie_attrs();
        HeaderValue::from_str(&format!("{COOKIE_NAME}=; Max-Age=0; {attrs}"))
            .unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    fn cookie_attrs(&self) -> String {
        let secure = if self.cookie_secure { " Secure;" } else { "" };
        format!("Path=/; HttpOnly; SameSite=Lax;{secure}")
    }

    /// Whether `headers` carries a validly signed, unexpired session
    /// cookie. Always `true` when no password is configured.
    #[must_use]
    pub fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        if self.app_password.is_none() {
            return true;
        }
        let Some(token) = extract_cookie(headers, COOKIE_NAME) else {
            return false;
        };
        let Ok(decoded) = URL_SAFE_NO_PAD.decode(token) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        let Some((payload, signature)) = decoded.split_once('.') else {
            return false;
        };
        let expected = self.sign(payload);
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return false;
        }
        let Ok(issued_at) = payload.parse::<i64>() else {
            return false;
        };
        wre_core::time::now_unix_seconds() - issued_at <= SESSION_TTL_SECONDS
    }
}

fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let pair = pair.trim();
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Middleware enforcing [`SessionAuth::is_authenticated`] on every request
/// it wraps. Returns [`ApiError::Unauthenticated`] (`401`) otherwise.
pub async fn require_session(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.session.is_authenticated(req.headers()) {
        return Err(ApiError::Unauthenticated);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_auth_always_authenticated() {
        let auth = SessionAuth::open();
        assert!(auth.is_authenticated(&HeaderMap::new()));
    }

    #[test]
    fn password_gate_rejects_wrong_password() {
        let auth = SessionAuth::new(Some("hunter2".to_string()), "secret".to_string(), false);
        assert!(auth.verify_password("hunter2"));
        assert!(!auth.verify_password("wrong"));
    }

    #[test]
    fn issued_cookie_round_trips_through_header_map() {
        let auth = SessionAuth::new(Some("hunter2".to_string()), "secret".to_string(), false);
        let cookie = auth.issue_cookie();
        let cookie_str = cookie.to_str().unwrap();
        let value = cookie_str.split(';').next().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, HeaderValue::from_str(value).unwrap());
        assert!(auth.is_authenticated(&headers));
    }

    #[test]
    fn tampered_cookie_is_rejected() {
        let auth = SessionAuth::new(Some("hunter2".to_string()), "secret".to_string(), false);
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("wre_session=not-a-valid-token"),
        );
        assert!(!auth.is_authenticated(&headers));
    }

    #[test]
    fn missing_cookie_is_rejected_when_password_configured() {
        let auth = SessionAuth::new(Some("hunter2".to_string()), "secret".to_string(), false);
        assert!(!auth.is_authenticated(&HeaderMap::new()));
    }
}
