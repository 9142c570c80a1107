use clap::Parser;
use quillgate::cli::{Args, build_config, init_logging, parse_service_url, validate_public_origin};
use quillgate::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(backend_base) = parse_service_url("backend", &args.backend_url) else {
        std::process::exit(1);
    };

    let Some(upstream_base) = parse_service_url("upstream", &args.upstream_url) else {
        std::process::exit(1);
    };

    let Some(public_origin) = validate_public_origin(&args.public_origin) else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().expect("Failed to get local address");
    let config = build_config(backend_base, upstream_base, &public_origin);

    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(&config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
