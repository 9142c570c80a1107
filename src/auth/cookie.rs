//! Session cookie reading and writing.
//!
//! Cookie names and attributes are a shared contract across the platform's
//! services: every service that touches the session pair must emit identical
//! attributes, or browsers may fail to overwrite or delete the cookies.

use axum::http::{HeaderMap, HeaderValue, header};

/// Cookie name for the access token (short-lived, 15 minutes).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (long-lived, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Access token cookie max-age: 15 minutes.
pub const ACCESS_COOKIE_MAX_AGE_SECS: u64 = 15 * 60;

/// Refresh token cookie max-age: 7 days.
pub const REFRESH_COOKIE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// The session cookie pair as read from a request. Each slot is
/// independently optional.
#[derive(Debug, Clone, Default)]
pub struct AuthCookies<'a> {
    pub access_token: Option<&'a str>,
    pub refresh_token: Option<&'a str>,
}

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Read both session cookies from a request's headers. Pure lookup, no side
/// effects.
pub fn read_auth_cookies(headers: &HeaderMap) -> AuthCookies<'_> {
    AuthCookies {
        access_token: get_cookie(headers, ACCESS_COOKIE_NAME),
        refresh_token: get_cookie(headers, REFRESH_COOKIE_NAME),
    }
}

/// Writer for the session cookie pair under the shared attribute contract:
/// HttpOnly, SameSite=Lax, Path=/, Secure only when serving over HTTPS.
/// Only the max-age differs between the two cookies.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    /// Whether to set the Secure flag (true behind HTTPS in production).
    pub secure: bool,
}

impl CookiePolicy {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    fn secure_suffix(&self) -> &'static str {
        if self.secure { "; Secure" } else { "" }
    }

    /// Format a Set-Cookie header value for the named session cookie.
    pub fn set_cookie(&self, name: &str, value: &str, max_age: u64) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
            name,
            value,
            max_age,
            self.secure_suffix()
        )
    }

    /// Format a Set-Cookie header value that deletes the named cookie.
    ///
    /// Base attributes must stay byte-identical with `set_cookie` for the
    /// same name, or browsers may keep the stale cookie. Max-Age=0 plus an
    /// epoch Expires covers clients that ignore one or the other.
    pub fn clear_cookie(&self, name: &str) -> String {
        format!(
            "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT{}",
            name,
            self.secure_suffix()
        )
    }

    /// Append a Set-Cookie header carrying a new access token.
    pub fn append_access_cookie(&self, headers: &mut HeaderMap, token: &str) {
        let cookie = self.set_cookie(ACCESS_COOKIE_NAME, token, ACCESS_COOKIE_MAX_AGE_SECS);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.append(header::SET_COOKIE, value);
        }
    }

    /// Append Set-Cookie headers deleting both session cookies.
    pub fn append_clear_all(&self, headers: &mut HeaderMap) {
        for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
            if let Ok(value) = HeaderValue::from_str(&self.clear_cookie(name)) {
                headers.append(header::SET_COOKIE, value);
            }
        }
    }
}
