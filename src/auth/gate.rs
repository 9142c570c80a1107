//! Per-request authentication gate.
//!
//! Runs once for every inbound request: refreshes the access token when it
//! is near expiry, applies route-protection redirects, injects identity
//! headers for API routes, and forwards everything else. The gate fails
//! open: an internal error clears the session cookies and still forwards
//! the request rather than locking users out of the whole site.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Uri, header::InvalidHeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, warn};
use url::form_urlencoded;

use super::cookie::{CookiePolicy, read_auth_cookies};
use super::refresh::{RefreshClient, should_refresh};
use super::routes::{classify, is_asset_path};
use super::session;
use crate::token::{self, DecodedToken, TokenType};

/// Identity headers injected for user-context API routes.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const AUTH_TYPE_HEADER: &str = "x-auth-type";

/// Query parameter carrying the original path across a login redirect.
const FROM_PARAM: &str = "from";

/// Shared state for the gate middleware.
#[derive(Clone)]
pub struct GateState {
    pub refresh: RefreshClient,
    pub cookies: CookiePolicy,
}

/// Session cookie mutation to apply to the outgoing response, whether that
/// response is a redirect or the forwarded upstream reply.
enum CookieMutation {
    None,
    SetAccess(String),
    ClearBoth,
}

enum GateAction {
    Forward,
    Redirect(String),
}

/// Errors from the fallible parts of the gate. These are caught at the
/// middleware top level and converted into the fail-open path.
#[derive(Debug)]
pub enum GateError {
    /// A decoded claim could not be represented as a request header.
    InvalidHeader(InvalidHeaderValue),
}

impl std::fmt::Display for GateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateError::InvalidHeader(e) => write!(f, "Invalid identity header value: {}", e),
        }
    }
}

impl std::error::Error for GateError {}

impl From<InvalidHeaderValue> for GateError {
    fn from(e: InvalidHeaderValue) -> Self {
        GateError::InvalidHeader(e)
    }
}

/// Middleware entrypoint. Mount with `axum::middleware::from_fn_with_state`.
pub async fn auth_gate(State(state): State<GateState>, mut request: Request, next: Next) -> Response {
    // Static assets and framework internals pass through untouched. Checked
    // before everything else so asset requests can never redirect-loop.
    if is_asset_path(request.uri().path()) {
        return next.run(request).await;
    }

    let (action, mutation) = match apply_gate(&state, &mut request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "Auth gate error, discarding session cookies");
            let mut response = next.run(request).await;
            state.cookies.append_clear_all(response.headers_mut());
            return response;
        }
    };

    let mut response = match action {
        GateAction::Forward => next.run(request).await,
        GateAction::Redirect(location) => Redirect::temporary(&location).into_response(),
    };

    match mutation {
        CookieMutation::None => {}
        CookieMutation::SetAccess(new_token) => {
            state
                .cookies
                .append_access_cookie(response.headers_mut(), &new_token);
        }
        CookieMutation::ClearBoth => state.cookies.append_clear_all(response.headers_mut()),
    }
    response
}

/// The gate body: refresh-if-needed, then route protection, then identity
/// injection. Refresh strictly precedes classification so routing decisions
/// observe the post-refresh session state.
async fn apply_gate(
    state: &GateState,
    request: &mut Request,
) -> Result<(GateAction, CookieMutation), GateError> {
    let path = request.uri().path().to_string();
    let cookies = read_auth_cookies(request.headers());
    let access_token = cookies.access_token.map(str::to_string);
    let refresh_token = cookies.refresh_token.map(str::to_string);

    let mut current_user = session::current_user(request.headers());
    let mut mutation = CookieMutation::None;

    if should_refresh(access_token.as_deref()) {
        if let Some(refresh_token) = refresh_token {
            match state.refresh.refresh(&refresh_token).await {
                Some(new_token) => {
                    debug!(path = %path, "Access token refreshed");
                    current_user =
                        token::decode(&new_token).filter(|t| t.is_usable(TokenType::Access));
                    mutation = CookieMutation::SetAccess(new_token);
                }
                None => {
                    // A failed refresh invalidates the whole session; a
                    // half-cleared pair would silently retry on every request.
                    debug!(path = %path, "Token refresh failed, clearing session");
                    current_user = None;
                    mutation = CookieMutation::ClearBoth;
                }
            }
        }
    }

    let authenticated = current_user.is_some();
    let class = classify(&path);

    // Authenticated users have no business on login/signup pages; send them
    // back where they came from.
    if authenticated && class.auth_only {
        let target = from_param(request.uri()).unwrap_or_else(|| "/".to_string());
        debug!(path = %path, target = %target, "Redirecting authenticated user off auth route");
        return Ok((GateAction::Redirect(target), mutation));
    }

    if class.protected && !authenticated {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair(FROM_PARAM, &path)
            .finish();
        debug!(path = %path, "Redirecting unauthenticated user to login");
        return Ok((GateAction::Redirect(format!("/login?{}", query)), mutation));
    }

    if class.needs_user_context {
        if let Some(user) = &current_user {
            inject_identity_headers(request.headers_mut(), user)?;
        }
    }

    Ok((GateAction::Forward, mutation))
}

/// Read the `from` query parameter. Only same-site paths are honored.
fn from_param(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == FROM_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| value.starts_with('/') && !value.starts_with("//"))
}

/// Inject the current user's identity into the forwarded request for
/// upstream API handlers.
fn inject_identity_headers(headers: &mut HeaderMap, user: &DecodedToken) -> Result<(), GateError> {
    // Validate every value before touching the request so a bad claim never
    // leaves a partially injected identity behind.
    let user_id = HeaderValue::from_str(&user.sub)?;
    let email = HeaderValue::from_str(user.email.as_deref().unwrap_or(""))?;
    let name = HeaderValue::from_str(user.name.as_deref().unwrap_or(""))?;
    let auth_type = HeaderValue::from_static(user.token_type.as_str());

    headers.insert(USER_ID_HEADER, user_id);
    headers.insert(USER_EMAIL_HEADER, email);
    headers.insert(USER_NAME_HEADER, name);
    headers.insert(AUTH_TYPE_HEADER, auth_type);
    Ok(())
}
