//! `connect`, `login` and `logout`.

use anyhow::{Context, Result, bail};
use console::style;

use mctools::actions::log_out_connection;
use mctools::config::Config;
use mctools::connection::auth::{TokenSet, TokenStore};
use mctools::endpoints::{host_key, normalize_mc_uri};
use mctools::ui::icons::CHECK;
use mctools::ui::{Spinner, UserInterface};

use super::Session;

/// Save a server to `config.toml` and check that it answers.
pub async fn cmd_connect(mut config: Config, url: Option<String>) -> Result<()> {
    let raw = url
        .or_else(|| config.cli_url.clone())
        .unwrap_or_else(|| config.toml.defaults.url.clone());
    let mc_uri = normalize_mc_uri(&raw)?;

    let config_path = config.config_file();
    if config.toml.add_connection(mc_uri.as_str())? {
        config.toml.save(&config_path)?;
        println!("Saved {} to {}", mc_uri, config_path.display());
    } else {
        println!("{} is already a saved connection", mc_uri);
    }

    let session = Session::new(config, false)?;
    let spinner = Spinner::start(format!("Connecting to {}...", mc_uri));
    let result = session.manager.connect(mc_uri.as_str()).await;
    spinner.finish();

    match result {
        Ok(connection) => {
            println!(
                "{}Connected to {} (Microclimate {})",
                CHECK, connection.mc_uri, connection.version_str
            );
        }
        Err(e) => {
            tracing::warn!(uri = %mc_uri, error = %e, "Connect failed");
            session
                .ui
                .show_error(&format!("Failed to connect to {}: {}", mc_uri, e));
        }
    }
    Ok(())
}

pub fn cmd_login(config: &Config, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("The token must not be empty");
    }

    let urls = config.connection_urls();
    let raw = match urls.as_slice() {
        [only] => only,
        _ => bail!(
            "{} servers are configured; choose one with --url",
            urls.len()
        ),
    };
    let mc_uri = normalize_mc_uri(raw)?;
    let host = host_key(&mc_uri);

    let store = TokenStore::load(&config.token_file())?;
    store
        .set_tokens_for(&host, Some(TokenSet::new(token)))
        .with_context(|| format!("Failed to store the token for {}", host))?;

    println!("{}Stored a token for {}", CHECK, style(&mc_uri).bold());
    Ok(())
}

pub async fn cmd_logout(config: Config) -> Result<()> {
    let session = Session::new(config, false)?;
    session.connect_all().await;

    // An unreachable server has no connection to log out of, but its token
    // can still be forgotten.
    if session.manager.connections().is_empty() {
        let urls = session.config.connection_urls();
        if let [only] = urls.as_slice() {
            let mc_uri = normalize_mc_uri(only)?;
            session.tokens.set_tokens_for(&host_key(&mc_uri), None)?;
            session.ui.show_info(&format!(
                "Logged out of {}\nUse \"mctools login\" to log back in.",
                mc_uri
            ));
            return Ok(());
        }
    }

    if let Err(e) = log_out_connection(&session.manager, None, &session.tokens, &session.ui) {
        session.ui.show_error(&format!("{:#}", e));
    }
    Ok(())
}
