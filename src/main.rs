//! Cluster gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────────┐
//!                    │                      GATEWAY                             │
//!   Client Request   │  ┌─────────┐   ┌──────────┐   ┌────────┐   ┌──────────┐  │
//!   ─────────────────┼─▶│  http   │──▶│ routing  │──▶│ params │──▶│   auth   │  │
//!                    │  │ server  │   │  table   │   │pipeline│   │   gate   │  │
//!                    │  └─────────┘   └──────────┘   └────────┘   └────┬─────┘  │
//!                    │                                                 │        │
//!                    │                              ┌──────────────────┤        │
//!                    │                              ▼                  ▼        │
//!                    │                        ┌──────────┐      ┌───────────┐   │
//!   Client Response  │                        │ handlers │      │   proxy   │◀──┼──▶ Upstream
//!   ◀────────────────┼────────────────────────│          │      │ forwarder │   │
//!                    │                        └──────────┘      └───────────┘   │
//!                    │  config · observability · lifecycle                      │
//!                    └──────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use cluster_gateway::config::{load_config, GatewayConfig};
use cluster_gateway::lifecycle::{signals, Shutdown};
use cluster_gateway::observability::{logging, metrics};
use cluster_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "cluster-gateway")]
#[command(about = "Request-normalizing API gateway and authenticating proxy", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    if cli.check {
        HttpServer::new(config.clone()).into_router()?;
        println!("configuration OK ({} routes)", config.routes.len());
        return Ok(());
    }

    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cluster-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
