//! TCP Line-Chat Relay - Entry Point
//!
//! Binds the listener, starts the Hub actor, and runs the accept loop.

use std::env;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::{Acceptor, Hub};

/// Default server address
const DEFAULT_ADDR: &str = "127.0.0.1:15001";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    // Get bind address from command line or use default
    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    // Failure to bind is fatal: nothing has been accepted yet.
    let listener = TcpListener::bind(&addr).await?;
    info!("Chat relay listening on {}", addr);

    // Create Hub actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    tokio::spawn(Hub::new(cmd_rx).run());

    info!("Hub actor started");

    // Accept loop runs for the lifetime of the process.
    Acceptor::new(listener, cmd_tx).run().await;

    Ok(())
}
