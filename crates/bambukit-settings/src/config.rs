//! Configuration file handling for BambuKit
//!
//! Supports JSON and TOML files, chosen by extension. Configuration is
//! organized into sections:
//! - Connection settings (broker host, printer serial and model)
//! - Job cache location
//! - Logging filter and output format

use crate::error::{ConfigError, SettingsError, SettingsResult};
use bambukit_core::DeviceType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default MQTT-over-TLS port on the printer
pub const DEFAULT_PORT: u16 = 8883;

/// File name used inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Printer connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Printer hostname or IP address
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Printer serial number; also names the report/request topics
    pub serial: String,
    /// Printer model, if known up front
    pub device_type: DeviceType,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            serial: String::new(),
            device_type: DeviceType::Unknown,
            keep_alive_secs: 60,
        }
    }
}

/// Local job cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Directory holding one sub-directory per cached print job
    pub directory: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let directory = dirs::cache_dir()
            .map(|dir| dir.join("bambukit").join("jobs"))
            .unwrap_or_else(|| PathBuf::from("jobs"));
        Self { directory }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Job cache settings
    pub cache: CacheSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

#[derive(Clone, Copy)]
enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("none").to_string()).into()),
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SettingsError + '_ {
    move |source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(io_error(path))?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        std::fs::write(path, content).map_err(io_error(path))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.serial.trim().is_empty() {
            return Err(ConfigError::MissingKey("connection.serial".to_string()));
        }

        if self.connection.port == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "connection.port".to_string(),
                value: "0".to_string(),
            });
        }

        if self.connection.keep_alive_secs == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "connection.keep_alive_secs".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

/// Path of the per-user configuration file
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("bambukit").join(CONFIG_FILE_NAME))
        .ok_or_else(|| ConfigError::UnsupportedPlatform(std::env::consts::OS.to_string()))
}
