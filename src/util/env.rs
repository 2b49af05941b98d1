//! Start-up configuration.
//!
//! Every option can be given as a flag or through the environment; a `.env` file in the working
//! directory is loaded first so it behaves like the real environment.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::hub::registry::{DEFAULT_MAILBOX_CAPACITY, DEFAULT_QUEUE_CAPACITY, HubConfig};

pub const DEFAULT_SERVICE_NAME: &str = "scoreboard-server";

pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error(transparent)]
    Args(#[from] clap::Error),

    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),
}

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Live event scoreboard server")]
pub struct Config {
    /// Port the HTTP API listens on
    #[arg(long, env = "SERVER_API_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Shared token for the score producer routes; the routes are not mounted without one
    #[arg(long, env = "INTERNAL_TOKEN", hide_env_values = true)]
    pub internal_token: Option<String>,

    /// Comma-separated list of allowed CORS origins, or `*`
    #[arg(long, env = "CORS_ALLOW_ORIGINS", default_value = "*")]
    pub cors_allow_origins: String,

    /// Hub command mailbox size; producers wait while it is full
    #[arg(long, env = "HUB_MAILBOX_CAPACITY", default_value_t = DEFAULT_MAILBOX_CAPACITY)]
    pub hub_mailbox_capacity: usize,

    /// Per-subscriber outbound queue size; a subscriber with a full queue is evicted
    #[arg(long, env = "SUBSCRIBER_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub subscriber_queue_capacity: usize,

    /// OTLP collector endpoint; console logging only when unset
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    #[arg(long, env = "API_SERVICE_NAME", default_value = DEFAULT_SERVICE_NAME)]
    pub service_name: String,

    /// JSON fixture of events, groups and games loaded at start-up
    #[arg(long = "seed", env = "SEED_FILE")]
    pub seed_file: Option<PathBuf>,
}

impl Config {
    /// Loads `.env` (if present), then parses the process arguments.
    pub fn load() -> ConfigResult<Self> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        Self::try_parse()?.validated()
    }

    pub fn validated(self) -> ConfigResult<Self> {
        if self.hub_mailbox_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("hub mailbox capacity"));
        }

        if self.subscriber_queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("subscriber queue capacity"));
        }

        Ok(self)
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            mailbox_capacity: self.hub_mailbox_capacity,
            queue_capacity: self.subscriber_queue_capacity,
        }
    }

    /// Configured CORS origins; `None` allows any origin.
    pub fn cors_origins(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .cors_allow_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_owned)
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            None
        } else {
            Some(origins)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            internal_token: None,
            cors_allow_origins: "*".to_string(),
            hub_mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            subscriber_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            otel_endpoint: None,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            seed_file: None,
        }
    }
}
