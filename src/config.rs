use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::tools_config::{CONFIG_FILE_NAME, ToolsToml};

/// Overrides the configuration directory.
pub const HOME_ENV: &str = "MCTOOLS_HOME";
/// Server to use when none is given on the command line.
pub const URL_ENV: &str = "MICROCLIMATE_URL";

/// Runtime configuration for mctools.
///
/// Layers `config.toml` under the environment and the command line. Paths
/// all live in one home directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub home: PathBuf,
    pub verbose: bool,
    /// CLI override: `--url`
    pub cli_url: Option<String>,
    /// Value of `MICROCLIMATE_URL`, if set
    pub env_url: Option<String>,
    pub toml: ToolsToml,
}

impl Config {
    /// Resolve the home directory from the environment and load `config.toml`.
    pub fn load(cli_url: Option<String>, verbose: bool) -> Result<Self> {
        let home = default_home();
        let env_url = std::env::var(URL_ENV).ok().filter(|u| !u.trim().is_empty());
        Self::with_home(home, cli_url, env_url, verbose)
    }

    pub fn with_home(
        home: PathBuf,
        cli_url: Option<String>,
        env_url: Option<String>,
        verbose: bool,
    ) -> Result<Self> {
        let toml = ToolsToml::load_or_default(&home)
            .with_context(|| format!("Failed to load configuration from {}", home.display()))?;
        Ok(Self {
            home,
            verbose,
            cli_url,
            env_url,
            toml,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.home.join(CONFIG_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    pub fn token_file(&self) -> PathBuf {
        self.home.join("tokens.json")
    }

    /// Servers to connect to: `--url` alone if given, otherwise the saved
    /// connections, otherwise `MICROCLIMATE_URL`, otherwise `defaults.url`.
    pub fn connection_urls(&self) -> Vec<String> {
        if let Some(url) = &self.cli_url {
            return vec![url.clone()];
        }
        if !self.toml.connections.is_empty() {
            return self.toml.connections.iter().map(|c| c.url.clone()).collect();
        }
        if let Some(url) = &self.env_url {
            return vec![url.clone()];
        }
        vec![self.toml.defaults.url.clone()]
    }

    pub fn poll_interval_secs(&self) -> u64 {
        self.toml.defaults.poll_interval_secs.max(1)
    }
}

/// `$MCTOOLS_HOME`, else `<config dir>/mctools`, else `./.mctools`.
fn default_home() -> PathBuf {
    if let Ok(home) = std::env::var(HOME_ENV)
        && !home.is_empty()
    {
        return PathBuf::from(home);
    }
    dirs::config_dir()
        .map(|dir| dir.join("mctools"))
        .unwrap_or_else(|| Path::new(".mctools").to_path_buf())
}
