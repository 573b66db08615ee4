//! Configuration view and validation commands: `mctools config`.

use anyhow::Result;

use mctools::config::{Config, HOME_ENV, URL_ENV};
use mctools::tools_config::ToolsToml;

use super::super::ConfigCommands;

pub fn cmd_config(config: &Config, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("mctools Configuration");
            println!("=====================");
            println!();
            println!("Home: {}", config.home.display());

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No config.toml found at {}; using defaults", config_path.display());
            }
            println!();

            let toml = &config.toml;
            println!("[defaults]");
            println!("  url = \"{}\"", toml.defaults.url);
            println!("  poll_interval_secs = {}", toml.defaults.poll_interval_secs);
            println!("  follow_logs = {}", toml.defaults.follow_logs);
            println!();

            if !toml.connections.is_empty() {
                println!("[[connections]]");
                for entry in &toml.connections {
                    println!("  url = \"{}\"", entry.url);
                }
                println!();
            }

            println!("Effective values (with env/CLI overrides):");
            if let Some(url) = &config.cli_url {
                println!("  --url = \"{}\"", url);
            }
            if let Some(url) = &config.env_url {
                println!("  {} = \"{}\"", URL_ENV, url);
            }
            println!("  connections = [{}]", config.connection_urls().join(", "));
            println!("  poll_interval_secs = {}", config.poll_interval_secs());
            println!();

            if !config_path.exists() {
                println!("Run 'mctools config init' to create a config.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No config.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.toml.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("config.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            ToolsToml::default().save(&config_path)?;

            println!("Created config.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [defaults] url, poll_interval_secs, follow_logs");
            println!("  - [[connections]] url, or run 'mctools connect <url>'");
            println!();
            println!("Set {} to keep configuration elsewhere.", HOME_ENV);
            println!();
        }
    }

    Ok(())
}
