//! Silent access token refresh against the auth backend.
//!
//! When the access token is absent or close to expiry and a refresh token is
//! present, the gate exchanges the refresh token for a new access token
//! before any routing decision is made. Failures are swallowed into `None`:
//! the caller clears the whole session rather than leaving a half-valid
//! cookie pair behind.

use std::time::Duration;

use reqwest::header::SET_COOKIE;
use tracing::{debug, warn};
use url::Url;

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
use crate::token::{self, unix_now};

/// Refresh when the access token expires within this window.
pub const REFRESH_WINDOW_SECS: u64 = 5 * 60;

/// Bound on the backend refresh call so a hanging backend cannot stall the
/// request pipeline. Timeout is treated identically to failure.
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether the access token slot needs a refresh: absent, undecodable, or
/// expiring in under [`REFRESH_WINDOW_SECS`].
pub fn should_refresh(access_token: Option<&str>) -> bool {
    let Some(access_token) = access_token else {
        return true;
    };
    let Some(decoded) = token::decode(access_token) else {
        return true;
    };
    within_refresh_window(decoded.exp, unix_now())
}

/// Strict window check: a token with exactly [`REFRESH_WINDOW_SECS`] left
/// does not refresh yet.
fn within_refresh_window(exp: u64, now: u64) -> bool {
    exp.saturating_sub(now) < REFRESH_WINDOW_SECS
}

/// HTTP client for the backend refresh endpoint.
#[derive(Debug, Clone)]
pub struct RefreshClient {
    http: reqwest::Client,
    refresh_url: String,
}

impl RefreshClient {
    /// Build a refresh client for the backend base URL
    /// (e.g. `http://localhost:8000`).
    pub fn new(backend_base: &Url) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REFRESH_TIMEOUT)
            .build()
            .expect("Failed to build refresh HTTP client");
        let refresh_url = format!(
            "{}/api/auth/refresh",
            backend_base.as_str().trim_end_matches('/')
        );
        Self { http, refresh_url }
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns the new access token value extracted from the response's
    /// Set-Cookie header. Network errors, timeouts, non-2xx responses and a
    /// missing cookie all yield `None`.
    pub async fn refresh(&self, refresh_token: &str) -> Option<String> {
        let response = match self
            .http
            .post(&self.refresh_url)
            .header(
                reqwest::header::COOKIE,
                format!("{}={}", REFRESH_COOKIE_NAME, refresh_token),
            )
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "Token refresh rejected by backend");
            return None;
        }

        let new_token = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(extract_access_token);

        if new_token.is_none() {
            warn!("Refresh response carried no access token cookie");
        }
        new_token
    }
}

/// Pull the access token value out of a Set-Cookie header line.
fn extract_access_token(set_cookie: &str) -> Option<String> {
    let rest = set_cookie.trim_start().strip_prefix(ACCESS_COOKIE_NAME)?;
    let value = rest.strip_prefix('=')?;
    let value = value.split(';').next().unwrap_or(value).trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn access_token(exp: u64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = serde_json::json!({
            "sub": "user-1",
            "type": "access",
            "iat": 0,
            "exp": exp,
        });
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{}.{}.sig", header, payload)
    }

    #[test]
    fn test_should_refresh_when_absent() {
        assert!(should_refresh(None));
    }

    #[test]
    fn test_should_refresh_when_malformed() {
        assert!(should_refresh(Some("not-a-jwt")));
        assert!(should_refresh(Some("")));
    }

    #[test]
    fn test_should_refresh_when_expired() {
        let token = access_token(unix_now().saturating_sub(100));
        assert!(should_refresh(Some(&token)));
    }

    #[test]
    fn test_should_refresh_inside_window() {
        let token = access_token(unix_now() + 100);
        assert!(should_refresh(Some(&token)));
    }

    #[test]
    fn test_refresh_window_boundary() {
        assert!(within_refresh_window(1299, 1000));
        assert!(!within_refresh_window(1300, 1000));
        assert!(!within_refresh_window(1301, 1000));
        // Expired tokens are always inside the window.
        assert!(within_refresh_window(900, 1000));
        assert!(within_refresh_window(0, 1000));
    }

    #[test]
    fn test_fresh_token_not_refreshed() {
        let token = access_token(unix_now() + 900);
        assert!(!should_refresh(Some(&token)));
    }

    #[test]
    fn test_extract_access_token() {
        assert_eq!(
            extract_access_token("access_token=abc; HttpOnly; Path=/"),
            Some("abc".to_string())
        );
        assert_eq!(extract_access_token("access_token=abc"), Some("abc".to_string()));
        assert_eq!(extract_access_token("refresh_token=abc; Path=/"), None);
        assert_eq!(extract_access_token("access_token=; Max-Age=0"), None);
        assert_eq!(extract_access_token("access_token_extra=abc"), None);
    }
}
