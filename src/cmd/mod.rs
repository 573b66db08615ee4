//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                                              |
//! |-----------|---------------------------------------------------------------|
//! | `tree`    | `Tree`, `Watch`, `Projects`                                   |
//! | `project` | `Restart`, `Build`, `AutoBuild`, `Enable`, `Disable`, `Unbind`, `Open`, `Create` |
//! | `logs`    | `Logs`                                                        |
//! | `auth`    | `Connect`, `Login`, `Logout`                                  |
//! | `config`  | `Config`                                                      |

pub mod auth;
pub mod config;
pub mod logs;
pub mod project;
pub mod tree;

use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;

use mctools::config::Config;
use mctools::connection::auth::TokenStore;
use mctools::connection::{Connection, ConnectionManager, MicroclimateClient};
use mctools::project::ProjectHandle;
use mctools::ui::{Spinner, TerminalUi, UserInterface};

pub use auth::{cmd_connect, cmd_login, cmd_logout};
pub use config::cmd_config;
pub use logs::cmd_logs;
pub use mctools::project::requests::StartMode;
pub use project::{ProjectAction, cmd_create, cmd_open, cmd_project_action};
pub use tree::{cmd_projects, cmd_tree, cmd_watch};

/// Everything a command needs to talk to the configured servers.
pub struct Session {
    pub config: Config,
    pub tokens: Arc<TokenStore>,
    pub client: MicroclimateClient,
    pub manager: Arc<ConnectionManager>,
    pub ui: TerminalUi,
}

impl Session {
    /// `sockets` opens a live event channel for every connection, for
    /// commands that stay running.
    pub fn new(config: Config, sockets: bool) -> Result<Self> {
        let tokens = Arc::new(TokenStore::load(&config.token_file())?);
        let client = MicroclimateClient::new(Arc::clone(&tokens));
        let mut manager = ConnectionManager::new(Arc::new(client.clone()));
        if sockets {
            manager = manager.with_sockets();
        }
        let manager = Arc::new(manager);
        if sockets {
            manager.spawn_signal_loop();
        }
        Ok(Self {
            config,
            tokens,
            client,
            manager,
            ui: TerminalUi,
        })
    }

    /// Connect to every configured server that isn't connected yet.
    /// Failures are reported and skipped. Returns how many connections are up.
    pub async fn connect_all(&self) -> usize {
        let urls: Vec<String> = self
            .config
            .connection_urls()
            .into_iter()
            .filter(|url| {
                mctools::endpoints::normalize_mc_uri(url)
                    .map(|uri| self.manager.find(&uri).is_none())
                    .unwrap_or(true)
            })
            .collect();

        if !urls.is_empty() {
            let spinner = Spinner::start(format!("Connecting to {}...", urls.join(", ")));
            let results = join_all(urls.iter().map(|url| self.manager.connect(url))).await;
            spinner.finish();

            for (url, result) in urls.iter().zip(results) {
                if let Err(e) = result {
                    tracing::warn!(%url, error = %e, "Connect failed");
                    self.ui
                        .show_error(&format!("Failed to connect to {}: {}", url, e));
                }
            }
        }

        self.manager
            .connections()
            .iter()
            .filter(|c| c.is_connected())
            .count()
    }

    /// Connect, then look a project up by ID or name. Problems are reported
    /// to the user and yield `None`.
    pub async fn resolve_project(&self, query: &str) -> Option<(Arc<Connection>, ProjectHandle)> {
        if self.connect_all().await == 0 {
            return None;
        }
        match self.manager.find_project(query).await {
            Ok(found) => Some(found),
            Err(e) => {
                self.ui.show_error(&e.to_string());
                None
            }
        }
    }
}
