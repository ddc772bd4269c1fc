//! # Bungee Gateway Binary
//!
//! Entry point for the reverse proxy: loads configuration, builds the HTTP
//! server (registry, active probers, failover driver), and serves until
//! interrupted, tearing down probers cleanly on shutdown.
//!
//! ## Usage
//!
//! ```bash
//! bungee-gateway --config gateway.toml
//! bungee-gateway --host 0.0.0.0 --port 8080
//! bungee-gateway --log-level debug
//! ```
//!
//! ## Environment Variables
//!
//! - `GATEWAY_HOST`, `GATEWAY_PORT`, `GATEWAY_TIMEOUT`, `GATEWAY_LOG_LEVEL`
//!   override the matching configuration fields.

use std::net::SocketAddr;

use bungee_gateway::{config::Config, server::create_server};
use clap::Parser;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: String,

    /// Port number for the HTTP server. Overrides the config file value.
    #[arg(short, long)]
    port: Option<u16>,

    /// Host address to bind the server to. Overrides the config file value.
    #[arg(long)]
    host: Option<String>,

    /// Logging level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    let mut config = Config::load(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let (app, prober) = create_server(config.clone()).await?;

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!(%addr, "starting bungee gateway");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    prober.stop_all();

    Ok(())
}

/// Waits for SIGINT (Ctrl+C) or, on unix, SIGTERM, so process managers can
/// stop the gateway cleanly.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
