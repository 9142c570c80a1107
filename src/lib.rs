pub mod auth;
pub mod cli;
pub mod client;
pub mod proxy;
pub mod token;

use auth::{CookiePolicy, GateState, RefreshClient, auth_gate};
use axum::{Router, middleware};
use proxy::ProxyState;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use url::Url;

pub struct GatewayConfig {
    /// Backend base URL hosting the auth and users services
    /// (e.g. `http://localhost:8000`)
    pub backend_base: Url,
    /// Rendering upstream that receives forwarded requests
    pub upstream_base: Url,
    /// Whether to set the Secure flag on session cookies (true behind HTTPS)
    pub secure_cookies: bool,
}

/// Create the gateway router: every request runs through the auth gate, and
/// whatever is not redirected falls through to the upstream proxy.
pub fn create_app(config: &GatewayConfig) -> Router {
    let gate_state = GateState {
        refresh: RefreshClient::new(&config.backend_base),
        cookies: CookiePolicy::new(config.secure_cookies),
    };
    let proxy_state = ProxyState::new(config.upstream_base.clone());

    Router::new()
        .fallback(proxy::proxy_handler)
        .with_state(proxy_state)
        .layer(middleware::from_fn_with_state(gate_state, auth_gate))
}

/// Run the gateway on the given listener. This function blocks until the
/// server exits.
pub async fn run_server(
    config: &GatewayConfig,
    listener: TcpListener,
) -> Result<(), std::io::Error> {
    let app = create_app(config);
    axum::serve(listener, app).await
}

/// Start the gateway on the given port in a background task. Use port 0 to
/// let the OS choose a random port. Returns the actual address the server is
/// listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: GatewayConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(&config, listener).await.ok();
    });

    (handle, local_addr)
}
