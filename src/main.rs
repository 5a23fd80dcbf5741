//! Chat Broker - Entry Point
//!
//! Starts the TCP listener and the fan-out loop, accepting connections
//! until Ctrl-C.

use std::env;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_broker::{serve, Coordinator, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_broker=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_broker=info")),
        )
        .init();

    let config = ServerConfig::from_args(env::args());

    // Start TCP listener; failing to bind is fatal
    let listener = match TcpListener::bind(&config.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.addr, e);
            return Err(e.into());
        }
    };
    info!("Chat broker listening on {}", config.addr);
    info!(
        "Mailbox capacity {}, broadcast queue {}, fan-out delay {:?}",
        config.mailbox_capacity, config.broadcast_capacity, config.fanout_delay
    );

    // Create the coordinator and start its fan-out loop
    let (coordinator, broadcaster) = Coordinator::new(&config);
    tokio::spawn(broadcaster.run());

    info!("Broadcaster spawned");

    tokio::select! {
        _ = serve(listener, coordinator) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        }
    }

    Ok(())
}
