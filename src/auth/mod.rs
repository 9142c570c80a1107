//! Cookie-based session management for the gateway.
//!
//! Dual-token system: short-lived access tokens (15 min) and long-lived
//! refresh tokens (7 days), both carried as HttpOnly cookies under a shared
//! cross-service attribute contract. Access tokens are silently refreshed by
//! the request gate when close to expiry; route protection and identity
//! header injection run against the post-refresh session state.

mod cookie;
mod gate;
mod refresh;
mod routes;
mod session;

pub use cookie::{
    ACCESS_COOKIE_MAX_AGE_SECS, ACCESS_COOKIE_NAME, AuthCookies, CookiePolicy,
    REFRESH_COOKIE_MAX_AGE_SECS, REFRESH_COOKIE_NAME, get_cookie, read_auth_cookies,
};
pub use gate::{
    AUTH_TYPE_HEADER, GateState, USER_EMAIL_HEADER, USER_ID_HEADER, USER_NAME_HEADER, auth_gate,
};
pub use refresh::{REFRESH_TIMEOUT, REFRESH_WINDOW_SECS, RefreshClient, should_refresh};
pub use routes::{RouteClass, classify, is_asset_path};
pub use session::{current_user, is_authenticated};
