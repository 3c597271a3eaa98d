//! Transform gateway
//!
//! A reverse proxy that can rewrite response bodies on selected routes.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                     GATEWAY                      │
//!                      │                                                  │
//!   Client Request     │  ┌─────────┐    ┌──────────┐    ┌────────────┐   │
//!   ───────────────────┼─▶│  http   │───▶│ routing  │───▶│   hyper    │───┼──▶ Upstream
//!                      │  │ server  │    │  engine  │    │   client   │   │
//!                      │  └─────────┘    └──────────┘    └─────┬──────┘   │
//!                      │                                       │          │
//!   Client Response    │  ┌──────────────────────────────┐     │          │
//!   ◀──────────────────┼──│ rewrite: aggregate → decode  │◀────┘          │
//!                      │  │   → transform → encode       │                │
//!                      │  └──────────────────────────────┘                │
//!                      │                                                  │
//!                      │  config · observability · lifecycle              │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use transform_gateway::config::{load_config, GatewayConfig};
use transform_gateway::lifecycle::{wait_for_signal, Shutdown};
use transform_gateway::observability::{logging, metrics};
use transform_gateway::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "transform-gateway", version, about = "Reverse proxy with response body rewriting")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "transform-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        worker_permits = config.rewrite.worker_permits,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        tracing::info!(signal, "Shutdown signal received");
        trigger.trigger();
    });

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
