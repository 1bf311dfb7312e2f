//! Application configuration.
//!
//! Loaded from an optional TOML file and then overridden from the command
//! line. Values are checked once by [`AppConfig::validate`] before anything
//! starts.

use crate::nmea::encoder::{DEFAULT_SPEED_DECIMALS, MAX_SPEED_DECIMALS};
use crate::server::{ServerConfig, DEFAULT_BIND_ADDRESS, DEFAULT_PORT};
use crate::source::{CircularParams, SourceConfig, SourceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Invalid {parameter}: {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

impl From<SourceError> for ConfigError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::InvalidParameter { parameter, reason } => {
                ConfigError::InvalidValue { parameter, reason }
            }
            other => ConfigError::InvalidValue {
                parameter: "source",
                reason: other.to_string(),
            },
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener and output settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Where fixes come from
    #[serde(default = "default_source")]
    pub source: SourceConfig,
}

fn default_source() -> SourceConfig {
    SourceConfig::Dynamic(CircularParams::new(55.7522, 37.6156))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            source: default_source(),
        }
    }
}

/// Server-related settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub bind_address: String,
    /// Per-client write timeout in milliseconds
    pub write_timeout_ms: u64,
    /// Hold the first fix until Enter is pressed
    pub wait_for_keypress: bool,
    /// Decimals in the RMC speed field
    pub speed_decimals: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            write_timeout_ms: 500,
            wait_for_keypress: false,
            speed_decimals: DEFAULT_SPEED_DECIMALS,
        }
    }
}

impl ServerSettings {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_address: self.bind_address.clone(),
            port: self.port,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            wait_for_start: self.wait_for_keypress,
            speed_decimals: self.speed_decimals,
        }
    }
}

impl AppConfig {
    /// Reject values that cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = &self.server;
        if server.port == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "port",
                reason: "must be between 1 and 65535".to_string(),
            });
        }
        if server.bind_address.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "bind_address",
                reason: "must not be empty".to_string(),
            });
        }
        if server.write_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "write_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        if server.speed_decimals > MAX_SPEED_DECIMALS {
            return Err(ConfigError::InvalidValue {
                parameter: "speed_decimals",
                reason: format!("must be at most {}", MAX_SPEED_DECIMALS),
            });
        }

        self.source.validate()?;
        Ok(())
    }
}

/// Get the application config directory.
pub fn get_config_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "lode", "lode")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

/// Load configuration from the default path, or defaults if there is no file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = get_config_path();
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    load_config_from(&path)
}

/// Load configuration from a specific file.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Save configuration to a file, creating parent directories.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::Serialize(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

    Ok(())
}
