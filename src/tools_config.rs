//! The `config.toml` file.
//!
//! # Configuration File Format
//!
//! ```toml
//! [defaults]
//! url = "http://localhost:9090/"
//! poll_interval_secs = 5
//! follow_logs = true
//!
//! [[connections]]
//! url = "http://localhost:9090/"
//!
//! [[connections]]
//! url = "https://mc.example.com/"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::endpoints::normalize_mc_uri;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Settings used when nothing more specific is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Server to connect to when no connection is configured
    #[serde(default = "default_url")]
    pub url: String,
    /// Seconds between refreshes in `watch`
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Keep streaming in `logs` until interrupted
    #[serde(default = "default_follow_logs")]
    pub follow_logs: bool,
}

fn default_url() -> String {
    "http://localhost:9090/".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_follow_logs() -> bool {
    true
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            poll_interval_secs: default_poll_interval_secs(),
            follow_logs: default_follow_logs(),
        }
    }
}

/// A saved Microclimate server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsToml {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
}

impl ToolsToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config.toml")
    }

    /// Load `config.toml` from `dir`, or the defaults if it doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Add a connection unless an equivalent URL is already saved.
    /// Returns whether the list changed.
    pub fn add_connection(&mut self, url: &str) -> Result<bool> {
        let normalized = normalize_mc_uri(url)?;
        let exists = self
            .connections
            .iter()
            .any(|c| normalize_mc_uri(&c.url).is_ok_and(|u| u == normalized));
        if exists {
            return Ok(false);
        }
        self.connections.push(ConnectionEntry {
            url: normalized.to_string(),
        });
        Ok(true)
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = normalize_mc_uri(&self.defaults.url) {
            warnings.push(format!("Invalid defaults.url: {}", e));
        }
        if self.defaults.poll_interval_secs == 0 {
            warnings.push("poll_interval_secs must be at least 1".to_string());
        }

        let mut seen = HashSet::new();
        for entry in &self.connections {
            match normalize_mc_uri(&entry.url) {
                Ok(url) => {
                    if !seen.insert(url.to_string()) {
                        warnings.push(format!("Duplicate connection '{}'", entry.url));
                    }
                }
                Err(e) => warnings.push(format!("Invalid connection url: {}", e)),
            }
        }

        warnings
    }
}
