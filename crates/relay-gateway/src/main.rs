//! Relay gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p relay-gateway
//! ```
//!
//! Configuration is loaded from environment variables. The binary wires
//! in-memory collaborators; production deployments embed the library
//! and inject their own.

use std::sync::Arc;

use relay_common::{try_init_tracing, AppConfig};
use relay_gateway::collaborators::{plain_token_validator, EchoIdentity, EphemeralMessageStore};
use relay_gateway::Collaborators;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    // Run the server
    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting relay gateway...");

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.app.env,
        port = config.gateway.port,
        "Configuration loaded"
    );

    let collaborators = Collaborators::new(Arc::new(EphemeralMessageStore::new()))
        .with_identity(Arc::new(EchoIdentity));

    relay_gateway::run(config, collaborators, plain_token_validator()).await?;

    Ok(())
}
