//! BambuKit Settings Crate
//!
//! Loads, validates and saves the BambuKit configuration file.

pub mod config;
pub mod error;

pub use config::{default_config_path, CacheSettings, Config, ConnectionSettings, LoggingSettings};
pub use error::{ConfigError, SettingsError, SettingsResult};
