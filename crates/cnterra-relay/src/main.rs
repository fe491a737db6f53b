//! cnterra Node Relay
//!
//! Streams one node's outbound data from the message bus to TCP clients,
//! one client at a time.

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use cnterra_core::RelayConfig;
use cnterra_core::tracing_init::{default_filter, init_tracing};

use cnterra_relay::{AmqpBus, Listener};

/// Node, listener and broker settings come from the environment
/// (`NODE_ID`, `RELAY_ADDRESS`, `RELAY_PORT`, `RABBITMQ_*`).
#[derive(Parser, Debug)]
#[command(name = "cnterra-relay")]
#[command(version, about = "cnterra node relay - message bus to TCP bridge")]
struct Args {
    /// Log level filter for the relay (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "CNTERRA_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "CNTERRA_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&default_filter(&args.log_level), args.log_json);

    let config = RelayConfig::from_env()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        node_id = %config.node_id,
        routing_key = %config.routing_key(),
        listen = %config.listen,
        broker = %config.bus,
        "Starting cnterra-relay"
    );

    let bus = AmqpBus::connect(&config.bus).await?;
    bus.declare_exchange(&config.bus.exchange).await?;

    let listener = Listener::bind(&config.listen)
        .await
        .with_context(|| format!("Error listening on '{}'", config.listen))?;

    tokio::select! {
        () = listener.serve(&bus, &config) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    if let Err(e) = bus.close().await {
        warn!(error = %e, "Failed to close bus connection");
    }
    info!("Relay stopped");
    Ok(())
}
