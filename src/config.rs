//! Configuration management for the Bibliotek client core

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the command/fetch API, without a trailing slash
    pub base_url: String,
    /// Upper bound for a single command call; a timeout is treated as transient
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PushConfig {
    /// Window over which change-feed events are coalesced before refreshing
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PolicyConfig {
    /// Loans due within this many days are flagged due-soon
    pub due_soon_horizon_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load environment variables from .env file, if any
        dotenvy::dotenv().ok();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add environment variables (with prefix BIBLIOTEK_)
            .add_source(
                Environment::with_prefix("BIBLIOTEK")
                    .separator("_")
                    .try_parsing(true),
            )
            // Override API base URL from API_BASE_URL env var if present
            .set_override_option("api.base_url", env::var("API_BASE_URL").ok())?
            .build()?;

        config.try_deserialize()
    }
}

impl PolicyConfig {
    /// Due-soon horizon as a chrono duration
    pub fn horizon(&self) -> chrono::Duration {
        chrono::Duration::days(self.due_soon_horizon_days)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { debounce_ms: 250 }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            due_soon_horizon_days: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            push: PushConfig::default(),
            policy: PolicyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Initialize tracing for an embedding application.
///
/// Front ends that already install their own subscriber can skip this.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bibliotek_client={}", config.level).into());

    if config.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
