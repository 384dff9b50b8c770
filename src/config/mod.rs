//! Configuration file management
//!
//! Loads the optional TOML configuration file.
//! Path: /etc/kms-splash/config.toml
//!
//! ```toml
//! [display]
//! device = "/dev/dri/card1"
//! connector = "eDP-1"
//! ```

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_CONNECTOR, DEFAULT_DRI_DEVICE, SYSTEM_CONFIG_PATH};

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display output settings
    pub display: DisplayConfig,
}

/// Display output settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// DRM device node
    pub device: PathBuf,
    /// Connector name as shown by `-l` (e.g. "HDMI-A-1")
    pub connector: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DRI_DEVICE),
            connector: DEFAULT_CONNECTOR.to_string(),
        }
    }
}

impl Config {
    /// Load the system config, falling back to built-in defaults when the
    /// file is missing or unreadable.
    pub fn load() -> Self {
        let path = Path::new(SYSTEM_CONFIG_PATH);
        if !path.exists() {
            info!("Using built-in default config");
            return Self::default();
        }
        match Self::load_from_file(path) {
            Ok(config) => {
                info!("Loaded config: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load config {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load settings from specified path
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
