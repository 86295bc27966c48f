use serde::{Deserialize, Serialize};

use crate::broker::RoutingPattern;
use crate::error::{AppError, Result};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Broker configuration
    pub broker: BrokerConfig,

    /// Stream configuration
    #[serde(default)]
    pub stream: StreamConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: NOTIFY_RELAY)
            .add_source(
                config::Environment::with_prefix("NOTIFY_RELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Validate cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.broker.validate()?;
        if self.stream.heartbeat_interval_secs == 0 {
            return Err(AppError::Configuration(
                "heartbeat_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

/// Broker connectivity and topology configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// AMQP connection URL. When absent, the relay runs without live
    /// notifications and only serves the HTTP surface.
    #[serde(default)]
    pub url: Option<String>,

    /// Topic exchange the producers publish to
    #[serde(default = "default_exchange")]
    pub exchange: String,

    /// Queue this relay consumes from
    #[serde(default = "default_queue")]
    pub queue: String,

    /// Topic pattern binding the queue to the exchange
    #[serde(default = "default_routing_pattern")]
    pub routing_pattern: String,

    /// Base reconnect delay in milliseconds
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Maximum reconnect attempts before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<()> {
        RoutingPattern::parse(&self.routing_pattern)
            .map_err(|e| AppError::Configuration(format!("invalid routing_pattern: {}", e)))?;

        if self.queue.is_empty() {
            return Err(AppError::Configuration("queue must not be empty".into()));
        }
        if self.exchange.is_empty() {
            return Err(AppError::Configuration("exchange must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: None,
            exchange: default_exchange(),
            queue: default_queue(),
            routing_pattern: default_routing_pattern(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Heartbeat interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Maximum notifications retained by the in-memory store
    #[serde(default = "default_max_notifications")]
    pub max_notifications: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_notifications: default_max_notifications(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics endpoint
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_exchange() -> String {
    "github-webhooks".to_string()
}

fn default_queue() -> String {
    "notifications".to_string()
}

fn default_routing_pattern() -> String {
    "webhook.#".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_max_notifications() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
