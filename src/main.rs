//! Service gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                  GATEWAY                     │
//!   Client Request       │  ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//!   ─────────────────────┼─▶│  rate    │──▶│ service  │──▶│  bearer  │  │
//!                        │  │  limit   │   │ routing  │   │  auth    │  │
//!                        │  └──────────┘   └──────────┘   └────┬─────┘  │
//!                        │                                     ▼        │
//!   Client Response      │  ┌──────────────────────────────────────┐    │
//!   ◀────────────────────┼──│ proxy forwarder (pool, retry, stream) │◀──┼── users / posts /
//!                        │  └──────────────────────────────────────┘    │   activities / ...
//!                        └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use service_gateway::config::load_config;
use service_gateway::lifecycle::{wait_for_signal, Shutdown};
use service_gateway::observability::{logging, metrics};
use service_gateway::GatewayServer;

#[derive(Debug, Parser)]
#[command(name = "service-gateway", version, about = "API gateway for backend microservices")]
struct Cli {
    /// TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding configuration.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mount_path = ?config.listener.mount_path,
        routes = config.routes.len(),
        rate_limit_strategy = ?config.rate_limit.strategy,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
