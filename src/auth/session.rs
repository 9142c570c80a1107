//! Request-scoped session resolution.
//!
//! Answers "is this request authenticated" and "who is the current user"
//! from the access token cookie alone. A request holding only a refresh
//! token is unauthenticated until the refresh flow has restored the access
//! slot.

use axum::http::HeaderMap;

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};
use crate::token::{self, DecodedToken, TokenType};

/// Decode the current user from the access token cookie.
///
/// Returns `None` when the cookie is missing, malformed, expired, or carries
/// a token of the wrong type.
pub fn current_user(headers: &HeaderMap) -> Option<DecodedToken> {
    let access_token = get_cookie(headers, ACCESS_COOKIE_NAME)?;
    let decoded = token::decode(access_token)?;
    decoded.is_usable(TokenType::Access).then_some(decoded)
}

/// Whether the request carries a usable access token.
pub fn is_authenticated(headers: &HeaderMap) -> bool {
    current_user(headers).is_some()
}
