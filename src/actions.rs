//! User-level actions shared by the commands: choosing a connection,
//! logging out and opening portal pages.

use anyhow::{Context, Result};
use std::sync::Arc;
use url::Url;

use crate::connection::auth::TokenStore;
use crate::connection::{Connection, ConnectionManager};
use crate::ui::UserInterface;

/// Resolve the connection an action applies to.
///
/// With no candidates the user is told so; with exactly one it is used
/// as-is; otherwise the user picks. `None` means there is nothing to act on.
pub fn prompt_for_connection(
    manager: &ConnectionManager,
    ui: &dyn UserInterface,
    connected_only: bool,
) -> Result<Option<Arc<Connection>>> {
    let candidates: Vec<Arc<Connection>> = manager
        .connections()
        .into_iter()
        .filter(|c| !connected_only || c.is_connected())
        .collect();

    match candidates.len() {
        0 => {
            ui.show_error(if connected_only {
                "No connected Microclimate servers"
            } else {
                "No Microclimate connections"
            });
            Ok(None)
        }
        1 => Ok(candidates.into_iter().next()),
        _ => {
            let labels: Vec<String> = candidates.iter().map(|c| c.mc_uri.to_string()).collect();
            let choice = ui.pick("Select a Microclimate connection", &labels)?;
            Ok(choice.and_then(|i| candidates.get(i).cloned()))
        }
    }
}

/// Forget the stored tokens for a connection's host and disconnect it.
/// Without a connection the user is asked for one; cancelling does nothing.
pub fn log_out_connection(
    manager: &ConnectionManager,
    connection: Option<Arc<Connection>>,
    tokens: &TokenStore,
    ui: &dyn UserInterface,
) -> Result<()> {
    let connection = match connection {
        Some(connection) => connection,
        None => match prompt_for_connection(manager, ui, false)? {
            Some(connection) => connection,
            None => return Ok(()),
        },
    };

    tokens
        .set_tokens_for(&connection.host, None)
        .with_context(|| format!("Failed to clear tokens for {}", connection.host))?;
    tracing::info!(uri = %connection.mc_uri, "Logged out");
    ui.show_info(&format!(
        "Logged out of {}\nUse \"mctools login\" to log back in.",
        connection.mc_uri
    ));
    connection.on_disconnect();
    Ok(())
}

/// Open a portal page in the default browser.
pub fn open_in_browser(url: &Url) -> Result<()> {
    tracing::debug!(%url, "Opening browser");
    open::that(url.as_str()).with_context(|| format!("Failed to open {}", url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::auth::TokenSet;
    use crate::connection::tests::{FakeApi, environment, uri};
    use std::cell::RefCell;

    #[derive(Default)]
    struct ScriptedUi {
        choice: Option<usize>,
        prompts: RefCell<Vec<Vec<String>>>,
        infos: RefCell<Vec<String>>,
        errors: RefCell<Vec<String>>,
    }

    impl UserInterface for ScriptedUi {
        fn pick(&self, _prompt: &str, choices: &[String]) -> Result<Option<usize>> {
            self.prompts.borrow_mut().push(choices.to_vec());
            Ok(self.choice)
        }

        fn show_info(&self, message: &str) {
            self.infos.borrow_mut().push(message.to_string());
        }

        fn show_error(&self, message: &str) {
            self.errors.borrow_mut().push(message.to_string());
        }
    }

    fn manager_with(uris: &[&str]) -> ConnectionManager {
        let manager = ConnectionManager::new(Arc::new(FakeApi::new(vec![])));
        for u in uris {
            manager
                .add(Url::parse(u).unwrap(), &environment())
                .unwrap();
        }
        manager
    }

    #[test]
    fn test_no_connections_reports_and_returns_none() {
        let manager = manager_with(&[]);
        let ui = ScriptedUi::default();
        assert!(prompt_for_connection(&manager, &ui, false).unwrap().is_none());
        assert_eq!(ui.errors.borrow().len(), 1);
    }

    #[test]
    fn test_single_connection_needs_no_prompt() {
        let manager = manager_with(&["http://localhost:9090/"]);
        let ui = ScriptedUi::default();
        let picked = prompt_for_connection(&manager, &ui, false).unwrap().unwrap();
        assert_eq!(picked.mc_uri, uri());
        assert!(ui.prompts.borrow().is_empty());
    }

    #[test]
    fn test_connected_only_filters_out_disconnected() {
        let manager = manager_with(&["http://localhost:9090/"]);
        let ui = ScriptedUi::default();
        assert!(prompt_for_connection(&manager, &ui, true).unwrap().is_none());
    }

    #[test]
    fn test_several_connections_prompt() {
        let manager = manager_with(&["http://a:9090/", "http://b:9090/"]);
        let ui = ScriptedUi {
            choice: Some(1),
            ..ScriptedUi::default()
        };
        let picked = prompt_for_connection(&manager, &ui, false).unwrap().unwrap();
        assert_eq!(picked.mc_uri.as_str(), "http://b:9090/");
        assert_eq!(
            ui.prompts.borrow()[0],
            vec!["http://a:9090/".to_string(), "http://b:9090/".to_string()]
        );
    }

    #[test]
    fn test_log_out_cancelled_is_ok() {
        let manager = manager_with(&["http://a:9090/", "http://b:9090/"]);
        let tokens = TokenStore::in_memory();
        tokens.set_tokens_for("a:9090", Some(TokenSet::new("t"))).unwrap();
        let ui = ScriptedUi::default();

        log_out_connection(&manager, None, &tokens, &ui).unwrap();
        assert!(tokens.tokens_for("a:9090").is_some());
        assert!(ui.infos.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_log_out_clears_tokens_and_disconnects() {
        let manager = Arc::new(ConnectionManager::new(Arc::new(FakeApi::new(vec![]))));
        let connection = manager.connect(uri().as_str()).await.unwrap();
        let tokens = TokenStore::in_memory();
        tokens
            .set_tokens_for("localhost:9090", Some(TokenSet::new("t")))
            .unwrap();
        let ui = ScriptedUi::default();

        log_out_connection(&manager, Some(connection.clone()), &tokens, &ui).unwrap();

        assert!(tokens.tokens_for("localhost:9090").is_none());
        assert!(!connection.is_connected());
        assert!(ui.infos.borrow()[0].starts_with("Logged out of http://localhost:9090/"));
    }
}
