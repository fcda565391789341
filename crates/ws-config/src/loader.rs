//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "websub.toml",
    "config.toml",
    "./config/websub.toml",
    "/etc/websub/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match self.find_config_file()? {
            Some(path) => {
                info!(?path, "Loading configuration from file");
                AppConfig::from_file(&path)?
            }
            None => AppConfig::default(),
        };

        apply_overrides(&mut config, |key| env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// An explicit path must exist; the search paths are optional.
    fn find_config_file(&self) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Ok(Some(path.clone()));
            }
            return Err(ConfigError::ValidationError(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        if let Ok(path) = env::var("WEBSUB_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
            warn!(?path, "WEBSUB_CONFIG points to a missing file, ignoring");
        }

        Ok(CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists()))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `WEBSUB_*` overrides read through `lookup`.
///
/// Unparseable numeric values are logged and skipped.
pub(crate) fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    fn parsed<T: std::str::FromStr>(key: &str, value: String) -> Option<T> {
        match value.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(key, value = %value, "Ignoring unparseable environment override");
                None
            }
        }
    }

    // HTTP
    if let Some(val) = lookup("WEBSUB_HTTP_HOST") {
        config.http.host = val;
    }
    if let Some(port) = lookup("WEBSUB_HTTP_PORT").and_then(|v| parsed("WEBSUB_HTTP_PORT", v)) {
        config.http.port = port;
    }

    // Database
    if let Some(val) = lookup("WEBSUB_DATABASE_URL") {
        config.database.url = val;
    }
    if let Some(max) = lookup("WEBSUB_DATABASE_MAX_CONNECTIONS")
        .and_then(|v| parsed("WEBSUB_DATABASE_MAX_CONNECTIONS", v))
    {
        config.database.max_connections = max;
    }

    // Hub
    if let Some(ms) = lookup("WEBSUB_HUB_TIMEOUT_MS").and_then(|v| parsed("WEBSUB_HUB_TIMEOUT_MS", v)) {
        config.hub.timeout_ms = ms;
    }
    if let Some(ms) = lookup("WEBSUB_HUB_CONNECT_TIMEOUT_MS")
        .and_then(|v| parsed("WEBSUB_HUB_CONNECT_TIMEOUT_MS", v))
    {
        config.hub.connect_timeout_ms = ms;
    }

    // Endpoint
    if let Some(max) = lookup("WEBSUB_MAX_CONTENT_BYTES")
        .and_then(|v| parsed("WEBSUB_MAX_CONTENT_BYTES", v))
    {
        config.endpoint.max_content_bytes = max;
    }

    // Callback
    if let Some(val) = lookup("WEBSUB_CALLBACK_BASE_URL") {
        config.callback.base_url = val;
    }
}
