//! Upstream request forwarding.
//!
//! Everything the gate does not redirect is handed to the rendering upstream
//! as-is, including any identity headers the gate injected. The gateway owns
//! no application routes of its own.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::warn;
use url::Url;

/// Cap on buffered request bodies forwarded upstream.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct ProxyState {
    pub http: reqwest::Client,
    pub upstream_base: Url,
}

impl ProxyState {
    pub fn new(upstream_base: Url) -> Self {
        let http = reqwest::Client::builder()
            .build()
            .expect("Failed to build proxy HTTP client");
        Self {
            http,
            upstream_base,
        }
    }

    fn upstream_url(&self, path_and_query: &str) -> String {
        format!(
            "{}{}",
            self.upstream_base.as_str().trim_end_matches('/'),
            path_and_query
        )
    }
}

/// Fallback handler: forward the request to the upstream and relay its
/// response. Upstream failures surface as 502 rather than hanging the
/// client.
pub async fn proxy_handler(State(state): State<ProxyState>, request: Request) -> Response {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let url = state.upstream_url(&path_and_query);

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response(),
    };

    // The Host header belongs to the upstream URL, not the gateway's.
    let mut headers = parts.headers;
    headers.remove(header::HOST);

    let upstream_response = match state
        .http
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!(url = %url, error = %e, "Upstream request failed");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let status = upstream_response.status();
    let mut headers = upstream_response.headers().clone();
    // Recomputed by the server for the relayed body.
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONTENT_LENGTH);

    let bytes = match upstream_response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to read upstream response");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
