//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present).

use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub redis: RedisConfig,
    pub presence: PresenceConfig,
    pub hub: HubTuning,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Gateway server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Redis configuration (backing store for presence markers)
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Presence tracking configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// Marker time-to-live; "online" means touched within this window
    #[serde(default = "default_presence_ttl")]
    pub ttl_seconds: u64,
    /// Upper bound for the presence list read-side
    #[serde(default = "default_presence_list_limit")]
    pub list_limit: usize,
}

/// Hub queue sizing
#[derive(Debug, Clone, Deserialize)]
pub struct HubTuning {
    /// Client-originated event queue capacity
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
    /// System-injected event queue capacity
    #[serde(default = "default_system_capacity")]
    pub system_capacity: usize,
    /// Per-connection outbound queue capacity; a full queue disconnects
    /// the recipient
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,
}

impl Default for HubTuning {
    fn default() -> Self {
        Self {
            inbound_capacity: default_inbound_capacity(),
            system_capacity: default_system_capacity(),
            send_queue_capacity: default_send_queue_capacity(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "relay".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_presence_ttl() -> u64 {
    45
}

fn default_presence_list_limit() -> usize {
    1000
}

fn default_inbound_capacity() -> usize {
    1024
}

fn default_system_capacity() -> usize {
    256
}

fn default_send_queue_capacity() -> usize {
    256
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: ServerConfig {
                host: env::var("GATEWAY_HOST").unwrap_or_else(|_| default_host()),
                port: env::var("GATEWAY_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(ConfigError::MissingVar("GATEWAY_PORT"))?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL"))?,
                max_connections: env::var("REDIS_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_redis_max_connections),
            },
            presence: PresenceConfig {
                ttl_seconds: env::var("PRESENCE_TTL_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_presence_ttl),
                list_limit: env::var("PRESENCE_LIST_LIMIT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_presence_list_limit),
            },
            hub: HubTuning {
                inbound_capacity: env::var("HUB_INBOUND_CAPACITY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_inbound_capacity),
                system_capacity: env::var("HUB_SYSTEM_CAPACITY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_system_capacity),
                send_queue_capacity: env::var("HUB_SEND_QUEUE_CAPACITY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_send_queue_capacity),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_environment_is_development() {
        assert!(Environment::Development.is_development());
        assert!(!Environment::Staging.is_development());
        assert!(!Environment::Production.is_development());
    }

    #[test]
    fn test_server_address() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        };
        assert_eq!(config.address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_app_name(), "relay");
        assert_eq!(default_host(), "127.0.0.1");
        assert_eq!(default_presence_ttl(), 45);
        assert_eq!(default_inbound_capacity(), 1024);
        assert_eq!(default_system_capacity(), 256);
        assert_eq!(default_send_queue_capacity(), 256);
    }

    #[test]
    fn test_hub_tuning_default() {
        let tuning = HubTuning::default();
        assert_eq!(tuning.inbound_capacity, 1024);
        assert_eq!(tuning.system_capacity, 256);
        assert_eq!(tuning.send_queue_capacity, 256);
    }
}
