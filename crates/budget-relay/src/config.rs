//! Configuration management for Budget Relay
//!
//! Layers, lowest precedence first: built-in defaults, an optional config file, then
//! `BUDGET_RELAY__SECTION__KEY` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "BUDGET_RELAY";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Webhook notifier configuration
    pub notifier: NotifierConfig,

    /// Throttle configuration
    pub throttle: ThrottleConfig,

    /// Throttle store configuration
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        let interval = self.throttle.min_interval_hours;
        if !interval.is_finite() || interval < 0.0 {
            return Err(Error::config(format!(
                "throttle.min_interval_hours must be a non-negative number, got {interval}"
            )));
        }

        if !self.notifier.webhook_url.is_empty() {
            let url = Url::parse(&self.notifier.webhook_url)
                .map_err(|e| Error::config(format!("notifier.webhook_url: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::config(format!(
                    "notifier.webhook_url must be http or https, got {}",
                    url.scheme()
                )));
            }
        }

        if self.store.backend != StoreBackend::Memory && self.store.url.is_empty() {
            return Err(Error::config(format!(
                "store.url is required for the {:?} backend",
                self.store.backend
            )));
        }

        if self.store.collection.is_empty() || self.store.document.is_empty() {
            return Err(Error::config("store.collection and store.document must be set"));
        }

        Ok(())
    }

    /// Like [`validate`](Self::validate), additionally requiring a webhook URL
    pub fn validate_for_delivery(&self) -> Result<()> {
        if self.notifier.webhook_url.is_empty() {
            return Err(Error::config(format!(
                "notifier.webhook_url is required (set {ENV_PREFIX}__NOTIFIER__WEBHOOK_URL)"
            )));
        }
        self.validate()
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Webhook notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Incoming-webhook URL of the chat channel
    pub webhook_url: String,
    /// Bold heading on every message
    pub title: String,
    /// Request timeout (e.g. "10s"); the HTTP client default when unset
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            title: "Budget Alert".to_string(),
            timeout: None,
        }
    }
}

/// How the send time is recorded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Record after delivery; concurrent invocations may both send
    #[default]
    LastWriterWins,
    /// Claim the slot with a conditional write before delivery, release it on failure
    Claim,
}

/// Throttle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum hours between two notifications
    pub min_interval_hours: f64,
    /// Write strategy for the throttle record
    pub write_mode: WriteMode,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_hours: 4.0,
            write_mode: WriteMode::default(),
        }
    }
}

/// Throttle store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory
    #[default]
    Memory,
    /// Redis hash
    Redis,
    /// PostgreSQL table
    Postgres,
}

/// Throttle store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to use
    pub backend: StoreBackend,
    /// Connection URL (redis:// or postgres://)
    pub url: String,
    /// Namespace of the throttle record
    pub collection: String,
    /// Key of the throttle record
    pub document: String,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// Apply SQL migrations on startup
    pub run_migrations: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: String::new(),
            collection: "alerts".to_string(),
            document: "lastSent".to_string(),
            max_connections: 5,
            run_migrations: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!((config.throttle.min_interval_hours - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.throttle.write_mode, WriteMode::LastWriterWins);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.collection, "alerts");
        assert_eq!(config.store.document, "lastSent");
        assert_eq!(config.notifier.title, "Budget Alert");
        assert!(config.notifier.timeout.is_none());
        assert!(config.validate().is_ok());
        assert!(config.validate_for_delivery().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
            [notifier]
            webhook_url = "https://hooks.example.com/services/T/B/X"
            timeout = "10s"

            [throttle]
            min_interval_hours = 1.5
            write_mode = "claim"

            [store]
            backend = "redis"
            url = "redis://localhost:6379"
            "#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(
            config.notifier.webhook_url,
            "https://hooks.example.com/services/T/B/X"
        );
        assert_eq!(config.notifier.timeout, Some(Duration::from_secs(10)));
        assert!((config.throttle.min_interval_hours - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.throttle.write_mode, WriteMode::Claim);
        assert_eq!(config.store.backend, StoreBackend::Redis);
        // Untouched keys keep their defaults
        assert_eq!(config.store.document, "lastSent");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_rejects_negative_interval() {
        let mut config = Config::default();
        config.throttle.min_interval_hours = -1.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.throttle.min_interval_hours = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_webhook_url() {
        let mut config = Config::default();
        config.notifier.webhook_url = "ftp://example.com/hook".to_string();
        assert!(config.validate().is_err());

        config.notifier.webhook_url = "::not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_remote_backend_requires_url() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Postgres;
        assert!(config.validate().is_err());

        config.store.url = "postgres://localhost/relay".to_string();
        assert!(config.validate().is_ok());
    }
}
