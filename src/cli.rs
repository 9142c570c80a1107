//! CLI argument parsing, validation, and startup helpers.

use crate::GatewayConfig;
use clap::Parser;
use tracing::error;
use url::Url;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Quillgate",
    about = "Authentication gateway for the blogging platform"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Backend base URL hosting the auth and users services
    #[arg(long, env = "QUILLGATE_BACKEND_URL", default_value = "http://localhost:8000")]
    pub backend_url: String,

    /// Rendering upstream that receives forwarded requests
    #[arg(long, env = "QUILLGATE_UPSTREAM_URL", default_value = "http://localhost:3001")]
    pub upstream_url: String,

    /// Externally visible origin of this gateway; the Secure cookie flag is
    /// derived from its scheme
    #[arg(long, env = "QUILLGATE_PUBLIC_ORIGIN", default_value = "http://localhost:3000")]
    pub public_origin: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Parse a service URL argument.
/// Returns None and logs an error if parsing fails.
pub fn parse_service_url(name: &str, value: &str) -> Option<Url> {
    match Url::parse(value) {
        Ok(url) => Some(url),
        Err(e) => {
            error!(url = %value, error = %e, "Invalid {} URL", name);
            None
        }
    }
}

/// Parse and validate the public origin URL.
/// Returns None and logs an error if validation fails.
pub fn validate_public_origin(public_origin: &str) -> Option<Url> {
    let url = match Url::parse(public_origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %public_origin, error = %e, "Invalid public origin URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));

    if !is_https && !is_localhost {
        error!("Public origin must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Build GatewayConfig from validated arguments.
pub fn build_config(backend_base: Url, upstream_base: Url, public_origin: &Url) -> GatewayConfig {
    let secure_cookies = public_origin.scheme() == "https";

    GatewayConfig {
        backend_base,
        upstream_base,
        secure_cookies,
    }
}
