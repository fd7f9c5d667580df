//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Device path; empty means auto-detect common USB paths
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Link tuning
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// How long to wait for the first response before faulting
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// Directory for rolling log files; empty logs to stdout only
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_baud_rate() -> u32 { 115_200 }
fn default_connect_timeout_ms() -> u64 { 4000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { dir: String::new() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            link: LinkConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.serial.baud_rate == 0 {
            return Err(crate::error::MspLinkError::Config(
                toml::de::Error::custom("baud_rate must be greater than 0"),
            ));
        }

        if self.link.connect_timeout_ms == 0 || self.link.connect_timeout_ms > 60_000 {
            return Err(crate::error::MspLinkError::Config(
                toml::de::Error::custom("connect_timeout_ms must be between 1 and 60000"),
            ));
        }

        Ok(())
    }
}
