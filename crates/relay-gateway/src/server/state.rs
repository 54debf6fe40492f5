//! Gateway state
//!
//! Shared dependencies for the HTTP/WebSocket surface: the hub, the
//! presence read-side, and the injected token validator.

use std::sync::Arc;

use relay_common::AppConfig;
use relay_core::{Presence, UserId};

use crate::hub::Hub;

/// Rejected bearer token
#[derive(Debug, thiserror::Error)]
#[error("invalid token")]
pub struct InvalidToken;

/// Injected token validation: token in, authenticated user id out.
///
/// The gateway never parses credentials itself; whoever wires the
/// server decides what a token is.
pub type AuthValidator = Arc<dyn Fn(&str) -> Result<UserId, InvalidToken> + Send + Sync>;

/// Gateway application state
#[derive(Clone)]
pub struct GatewayState {
    hub: Arc<Hub>,
    presence: Arc<dyn Presence>,
    auth: AuthValidator,
    config: Arc<AppConfig>,
}

impl GatewayState {
    pub fn new(
        hub: Arc<Hub>,
        presence: Arc<dyn Presence>,
        auth: AuthValidator,
        config: AppConfig,
    ) -> Self {
        Self {
            hub,
            presence,
            auth,
            config: Arc::new(config),
        }
    }

    /// Get the hub
    #[must_use]
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Get the presence read-side
    #[must_use]
    pub fn presence(&self) -> &Arc<dyn Presence> {
        &self.presence
    }

    /// Get the token validator
    #[must_use]
    pub fn auth(&self) -> &AuthValidator {
        &self.auth
    }

    /// Get the application configuration
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("connections", &self.hub.registry().connection_count())
            .field("config", &"AppConfig")
            .finish()
    }
}
