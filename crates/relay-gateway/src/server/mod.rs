//! Gateway server setup
//!
//! Wires the hub, the presence store, and the injected collaborators
//! into an axum application, and owns graceful shutdown.

mod handler;
mod state;

pub use handler::{gateway_handler, health_check, room_presence, ApiError, PresenceResponse};
pub use state::{AuthValidator, GatewayState, InvalidToken};

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use relay_common::{AppConfig, AppError};
use relay_presence::{RedisPool, RedisPresence};

use crate::hub::{Collaborators, Hub, HubConfig};

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/ws", get(gateway_handler))
        .route("/rooms/:room_id/presence", get(room_presence))
        .route("/health", get(health_check))
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize all dependencies, start the hub loop, and create
/// `GatewayState`.
///
/// When the injected collaborators carry no presence store, a
/// Redis-backed one is built from the configuration and shared between
/// the hub and the presence endpoint.
pub async fn create_gateway_state(
    config: AppConfig,
    collaborators: Collaborators,
    auth: AuthValidator,
) -> Result<GatewayState, AppError> {
    let mut collaborators = collaborators;

    let presence = match collaborators.presence.clone() {
        Some(presence) => presence,
        None => {
            tracing::info!("Connecting to Redis...");
            let pool =
                RedisPool::from_config(&config.redis).map_err(|e| AppError::Cache(e.to_string()))?;
            pool.health_check()
                .await
                .map_err(|e| AppError::Cache(e.to_string()))?;
            tracing::info!("Redis connection established");

            let presence: Arc<dyn relay_core::Presence> = Arc::new(RedisPresence::new(
                pool,
                Duration::from_secs(config.presence.ttl_seconds),
            ));
            collaborators.presence = Some(presence.clone());
            presence
        }
    };

    let hub = Hub::new(
        HubConfig {
            inbound_capacity: config.hub.inbound_capacity,
            system_capacity: config.hub.system_capacity,
            send_queue_capacity: config.hub.send_queue_capacity,
        },
        collaborators,
    );
    tokio::spawn(hub.clone().run());

    Ok(GatewayState::new(hub, presence, auth, config))
}

/// Run the gateway server until the listener fails or shutdown is
/// requested
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), AppError> {
    tracing::info!("Starting gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

/// Run the complete gateway with configuration and injected
/// collaborators
pub async fn run(
    config: AppConfig,
    collaborators: Collaborators,
    auth: AuthValidator,
) -> Result<(), AppError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.gateway.port));

    let state = create_gateway_state(config, collaborators, auth).await?;
    let hub = state.hub().clone();
    let app = create_app(state);

    let result = run_server(app, addr).await;

    // Drain the hub after the listener stops accepting
    hub.shutdown().await;
    tracing::info!("Gateway stopped");

    result
}
