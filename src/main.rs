//! Relay server entry point
//!
//! Binds the listener, attaches a logging observer, and runs until
//! interrupted.

use std::env;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use line_relay::{LoggingObserver, RelayServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG to control log level, e.g. RUST_LOG=line_relay=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("line_relay=info")),
        )
        .init();

    let mut config = ServerConfig::from_env();
    if let Some(port) = env::args().nth(1) {
        config.port = port.parse()?;
    }

    let server = RelayServer::new(config, Arc::new(LoggingObserver));
    if let Err(e) = server.start().await {
        // Bind failure is the only fatal condition; report it and stop.
        error!("{}", e);
        return Err(e.into());
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
