//! WebSub Subscriber Configuration
//!
//! TOML-based configuration with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub hub: HubConfig,
    pub endpoint: EndpointConfig,
    pub callback: CallbackConfig,
}

/// Callback endpoint listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
        }
    }
}

impl HttpConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Subscription database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx SQLite URL, e.g. `sqlite://websub.db` or `sqlite::memory:`
    pub url: String,
    pub max_connections: u32,
    pub create_if_missing: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://websub.db".to_string(),
            max_connections: 5,
            create_if_missing: true,
        }
    }
}

/// Outbound requests to hubs and the callback probe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Whole-request timeout in milliseconds
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            user_agent: concat!("websub-subscriber/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Inbound content delivery limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub max_content_bytes: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_content_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Public address hubs use to reach the endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// e.g. `https://example.com/subscriptions`; empty when unset
    pub base_url: String,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::ValidationError("http.port must be non-zero".to_string()));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError("database.url must be set".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.hub.timeout_ms == 0 || self.hub.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "hub timeouts must be non-zero".to_string(),
            ));
        }
        let base = &self.callback.base_url;
        if !base.is_empty() && !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "callback.base_url must be an http(s) URL: {}",
                base
            )));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# WebSub Subscriber Configuration
# Environment variables (WEBSUB_*) override these settings

[http]
host = "localhost"
port = 8080

[database]
url = "sqlite://websub.db"
max_connections = 5
create_if_missing = true

[hub]
timeout_ms = 30000
connect_timeout_ms = 10000
user_agent = "websub-subscriber"

[endpoint]
max_content_bytes = 10485760  # 10 MiB

[callback]
# Public URL of the /subscriptions endpoint, used when subscribing
base_url = ""
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.bind_address(), "localhost:8080");
        assert_eq!(config.hub.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_example_toml_parses() {
        let config: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.endpoint.max_content_bytes, 10_485_760);
        assert!(config.callback.base_url.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\nport = 9999\n\n[callback]\nbase_url = \"https://sub.example/subscriptions\"").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.http.port, 9999);
        assert_eq!(config.http.host, "localhost");
        assert_eq!(config.database.url, "sqlite://websub.db");
        assert_eq!(config.callback.base_url, "https://sub.example/subscriptions");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http\nport = ").unwrap();
        assert!(matches!(AppConfig::from_file(file.path()), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.http.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.hub.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.callback.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.url = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
