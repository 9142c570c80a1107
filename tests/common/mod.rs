#![allow(dead_code)]

//! Shared fixtures: token minting plus mock backend and upstream servers.
//!
//! The mock backend mints real signed JWTs. The gateway never verifies
//! signatures, but fixtures should look like what the production backend
//! emits.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{EncodingKey, Header};
use serde::Serialize;
use tokio::net::TcpListener;
use url::Url;

use quillgate::{GatewayConfig, create_app};

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-for-the-gateway";

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[derive(Serialize)]
struct Claims {
    sub: String,
    email: String,
    name: String,
    #[serde(rename = "type")]
    token_type: String,
    iat: u64,
    exp: u64,
    jti: String,
}

/// Mint a signed token expiring `ttl_secs` from now (negative for already
/// expired).
pub fn mint_token(token_type: &str, sub: &str, ttl_secs: i64) -> String {
    mint_token_with_email(token_type, sub, "alice@example.com", ttl_secs)
}

pub fn mint_token_with_email(token_type: &str, sub: &str, email: &str, ttl_secs: i64) -> String {
    let now = unix_now();
    let claims = Claims {
        sub: sub.to_string(),
        email: email.to_string(),
        name: "Alice".to_string(),
        token_type: token_type.to_string(),
        iat: now,
        exp: now.saturating_add_signed(ttl_secs),
        jti: uuid::Uuid::new_v4().to_string(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET),
    )
    .expect("Failed to mint token")
}

/// Behavior switches and call counters for the mock backend.
#[derive(Clone, Default)]
pub struct BackendState {
    /// The refresh token value the /refresh endpoint accepts.
    pub valid_refresh_token: Arc<Mutex<Option<String>>>,
    /// 200 without a Set-Cookie header from /refresh.
    pub refresh_omits_cookie: Arc<AtomicBool>,
    /// Force 500s from logout/logout-all.
    pub fail_mutations: Arc<AtomicBool>,
    /// Delay /me responses (exercises the single-flight guard).
    pub me_delay_ms: Arc<AtomicU64>,
    pub login_calls: Arc<AtomicUsize>,
    pub refresh_calls: Arc<AtomicUsize>,
    pub me_calls: Arc<AtomicUsize>,
}

impl BackendState {
    pub fn accept_refresh_token(&self, token: &str) {
        *self.valid_refresh_token.lock().unwrap() = Some(token.to_string());
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key.trim() == name).then_some(value.trim())
    })
}

fn user_profile_json() -> serde_json::Value {
    serde_json::json!({
        "id": "user-1",
        "email": "alice@example.com",
        "name": "Alice",
        "emailVerified": true,
        "isActive": true,
        "loginCount": 1,
        "createdAt": "2024-01-01T00:00:00Z",
    })
}

fn access_set_cookie() -> String {
    format!(
        "access_token={}; HttpOnly; SameSite=Lax; Path=/; Max-Age=900",
        mint_token("access", "user-1", 900)
    )
}

fn refresh_set_cookie() -> String {
    format!(
        "refresh_token={}; HttpOnly; SameSite=Lax; Path=/; Max-Age=604800",
        mint_token("refresh", "user-1", 604800)
    )
}

async fn login(State(state): State<BackendState>, body: String) -> impl IntoResponse {
    state.login_calls.fetch_add(1, Ordering::SeqCst);

    let fields: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();
    let field = |name: &str| {
        fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    if field("username") == Some("alice@example.com") && field("password") == Some("password123") {
        (
            StatusCode::OK,
            AppendHeaders([
                (header::SET_COOKIE, access_set_cookie()),
                (header::SET_COOKIE, refresh_set_cookie()),
            ]),
            Json(serde_json::json!({
                "user": user_profile_json(),
                "message": "Login successful",
            })),
        )
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "Invalid credentials" })),
        )
            .into_response()
    }
}

async fn refresh(State(state): State<BackendState>, headers: HeaderMap) -> impl IntoResponse {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let presented = cookie_value(&headers, "refresh_token");
    let expected = state.valid_refresh_token.lock().unwrap().clone();
    if presented.is_none() || presented.map(String::from) != expected {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "Invalid or expired refresh token" })),
        )
            .into_response();
    }

    if state.refresh_omits_cookie.load(Ordering::SeqCst) {
        return StatusCode::OK.into_response();
    }

    (
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, access_set_cookie())]),
    )
        .into_response()
}

async fn me(State(state): State<BackendState>, headers: HeaderMap) -> impl IntoResponse {
    state.me_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.me_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
    }

    if cookie_value(&headers, "access_token").is_some() {
        Json(user_profile_json()).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "Not authenticated" })),
        )
            .into_response()
    }
}

async fn logout(State(state): State<BackendState>) -> impl IntoResponse {
    if state.fail_mutations.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    StatusCode::OK.into_response()
}

async fn forgot_password() -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "detail": "Unknown email address" })),
    )
}

/// Spawn the mock auth/users backend on a random port.
pub async fn spawn_backend(state: BackendState) -> SocketAddr {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/logout-all", post(logout))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/users/me", get(me))
        .with_state(state);

    spawn(app).await
}

/// Echo prefix for identity headers relayed by the mock upstream.
pub const ECHO_PREFIX: &str = "echo-";

async fn upstream_handler(request: axum::extract::Request) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    for name in ["x-user-id", "x-user-email", "x-user-name", "x-auth-type"] {
        if let Some(value) = request.headers().get(name) {
            let echoed = format!("{}{}", ECHO_PREFIX, name);
            headers.insert(
                axum::http::HeaderName::try_from(echoed).unwrap(),
                value.clone(),
            );
        }
    }
    (headers, format!("upstream:{}", request.uri().path()))
}

/// Spawn a mock rendering upstream that echoes injected identity headers
/// back as `echo-x-user-*` response headers.
pub async fn spawn_upstream() -> SocketAddr {
    spawn(Router::new().fallback(upstream_handler)).await
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

pub fn base_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("http://{}", addr)).expect("Invalid URL")
}

/// Build a gateway router wired to fresh mock backend and upstream servers.
pub async fn gateway_app() -> (Router, BackendState) {
    let state = BackendState::default();
    let backend_addr = spawn_backend(state.clone()).await;
    let upstream_addr = spawn_upstream().await;

    let config = GatewayConfig {
        backend_base: base_url(backend_addr),
        upstream_base: base_url(upstream_addr),
        secure_cookies: false,
    };
    (create_app(&config), state)
}
