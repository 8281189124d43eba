//! V4 Configuration System using Figment
//!
//! This module provides strongly-typed configuration loading for the V4 architecture.
//! Configuration is loaded from:
//! 1. config.v4.toml file (base configuration)
//! 2. Environment variables (prefixed with RUST_DAQ_)
//!
//! # Example
//! ```no_run
//! use rust_daq::config_v4::V4Config;
//!
//! let config = V4Config::load()?;
//! println!("Application: {}", config.application.name);
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level V4 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V4Config {
    /// Application settings
    pub application: ApplicationConfig,
    /// Kameo actor system settings
    pub actors: ActorConfig,
    /// Storage backend settings
    pub storage: StorageConfig,
    /// Instrument definitions
    pub instruments: Vec<InstrumentDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Kameo actor system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Default mailbox capacity for actor message queues
    #[serde(default = "default_mailbox_capacity")]
    pub default_mailbox_capacity: usize,
    /// Actor spawn timeout in milliseconds
    #[serde(default = "default_spawn_timeout")]
    pub spawn_timeout_ms: u64,
    /// Actor shutdown timeout in milliseconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Default storage backend (arrow, hdf5, or both)
    pub default_backend: String,
    /// Output directory for data files
    pub output_dir: PathBuf,
    /// Compression level (0-9)
    #[serde(default = "default_compression")]
    pub compression_level: u8,
    /// Auto-flush interval in seconds (0 = manual only)
    #[serde(default)]
    pub auto_flush_interval_secs: u64,
}

/// Instrument definition in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentDefinition {
    /// Unique instrument identifier
    pub id: String,
    /// Instrument type (e.g., "MockPowerMeter", "Newport1830C")
    pub r#type: String,
    /// Whether this instrument is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Instrument-specific configuration (dynamic)
    pub config: toml::Value,
}

// Default value functions
fn default_mailbox_capacity() -> usize {
    100
}

fn default_spawn_timeout() -> u64 {
    5000
}

fn default_shutdown_timeout() -> u64 {
    5000
}

fn default_compression() -> u8 {
    6
}

fn default_enabled() -> bool {
    true
}

impl V4Config {
    /// Load configuration from config.v4.toml and environment variables
    ///
    /// Environment variables can override configuration with prefix RUST_DAQ_
    /// Example: RUST_DAQ_APPLICATION_LOG_LEVEL=debug
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("config/config.v4.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RUST_DAQ_").split("_"))
            .extract()
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        // Validate storage backend
        let valid_backends = ["arrow", "hdf5", "both"];
        if !valid_backends.contains(&self.storage.default_backend.as_str()) {
            return Err(format!(
                "Invalid storage backend '{}'. Must be one of: {}",
                self.storage.default_backend,
                valid_backends.join(", ")
            ));
        }

        // Validate compression level
        if self.storage.compression_level > 9 {
            return Err(format!(
                "Invalid compression_level {}. Must be 0-9",
                self.storage.compression_level
            ));
        }

        // Validate instrument IDs are unique
        let mut ids = std::collections::HashSet::new();
        for instrument in &self.instruments {
            if !ids.insert(&instrument.id) {
                return Err(format!("Duplicate instrument ID: {}", instrument.id));
            }
        }

        Ok(())
    }

    /// Get all enabled instruments
    pub fn enabled_instruments(&self) -> Vec<&InstrumentDefinition> {
        self.instruments
            .iter()
            .filter(|inst| inst.enabled)
            .collect()
    }
}
