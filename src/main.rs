//! API gateway
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ http server ──▶ GatewayHandler
//!                      (request id,     │
//!                       timeout,        ├─ WeightCalculator   (per-request group draws)
//!                       trace)          ├─ RouteTable         (first matching route)
//!                                       └─ FilterChain        (global + route filters)
//!                                            │
//!                                            ├─ HttpRouting       ──▶ upstream HTTP
//!                                            ├─ WebsocketRouting  ──▶ upstream WebSocket
//!                                            └─ ForwardRouting    ──▶ GatewayHandler (re-entry)
//!
//!     Route definitions: config + routes file ──▶ RouteRefresher ──▶ RouteTable
//!                        admin API ─────────────┘   (periodic, on change, on SIGHUP)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::{load_config, GatewayConfig};
use api_gateway::lifecycle::{signals, Gateway};
use api_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "api-gateway", version, about = "API gateway", long_about = None)]
struct Args {
    /// Path of the TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(config.observability.log_level.as_deref());
    tracing::info!("api-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        routes_file = ?config.gateway.routes_file,
        refresh_interval_secs = config.gateway.refresh_interval_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let admin = if config.admin.enabled {
        if config.admin.api_key == api_gateway::config::AdminConfig::default().api_key {
            tracing::warn!("Admin API is using the placeholder api_key");
        }
        Some(TcpListener::bind(&config.admin.bind_address).await?)
    } else {
        None
    };

    let gateway = Gateway::build(config).await?;

    let shutdown = gateway.shutdown();
    let refresh = gateway.refresh_trigger();
    tokio::spawn(async move {
        if let Err(e) = signals::listen(shutdown, refresh).await {
            tracing::error!(error = %e, "Failed to listen for signals");
        }
    });

    gateway.run(listener, admin).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
