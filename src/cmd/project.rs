//! Project actions and portal pages: `restart`, `build`, `auto-build`,
//! `enable`, `disable`, `unbind`, `open`, `create`.

use anyhow::Result;
use std::fmt;

use mctools::actions::{open_in_browser, prompt_for_connection};
use mctools::config::Config;
use mctools::endpoints::{resolve_app_monitor_url, resolve_create_or_import_url};
use mctools::project::requests::StartMode;
use mctools::project::{Project, read_project};
use mctools::ui::{Spinner, UserInterface};

use super::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    Restart(StartMode),
    Build,
    AutoBuild(bool),
    Enable,
    Disable,
    Unbind,
}

impl ProjectAction {
    /// Why the action can't apply to `project` right now, if it can't.
    fn rejection(&self, project: &Project) -> Option<&'static str> {
        let enabled = project.state.is_enabled();
        match self {
            Self::Restart(_) | Self::Build | Self::AutoBuild(_) if !enabled => {
                Some("the project is disabled")
            }
            Self::AutoBuild(on) if *on == project.auto_build_enabled => Some(if *on {
                "auto-build is already on"
            } else {
                "auto-build is already off"
            }),
            Self::Enable if enabled => Some("the project is already enabled"),
            Self::Disable if !enabled => Some("the project is already disabled"),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restart(StartMode::Run) => write!(f, "restart"),
            Self::Restart(mode) => write!(f, "restart in {} mode", mode.as_str()),
            Self::Build => write!(f, "build"),
            Self::AutoBuild(true) => write!(f, "enable auto-build"),
            Self::AutoBuild(false) => write!(f, "disable auto-build"),
            Self::Enable => write!(f, "enable"),
            Self::Disable => write!(f, "disable"),
            Self::Unbind => write!(f, "unbind"),
        }
    }
}

pub async fn cmd_project_action(config: Config, query: &str, action: ProjectAction) -> Result<()> {
    let session = Session::new(config, false)?;
    let Some((connection, handle)) = session.resolve_project(query).await else {
        return Ok(());
    };

    let (id, name, rejection) = {
        let project = read_project(&handle);
        (project.id.clone(), project.name.clone(), action.rejection(&project))
    };
    if let Some(reason) = rejection {
        session
            .ui
            .show_error(&format!("Cannot {} {}: {}", action, name, reason));
        return Ok(());
    }

    let spinner = Spinner::start(format!("Requesting {} of {}...", action, name));
    let client = &session.client;
    let uri = &connection.mc_uri;
    let result = match action {
        ProjectAction::Restart(mode) => client.request_restart(uri, &id, mode).await,
        ProjectAction::Build => client.request_build(uri, &id).await,
        ProjectAction::AutoBuild(enable) => client.request_set_auto_build(uri, &id, enable).await,
        ProjectAction::Enable => client.request_set_enabled(uri, &id, true).await,
        ProjectAction::Disable => client.request_set_enabled(uri, &id, false).await,
        ProjectAction::Unbind => client.request_unbind(uri, &id).await,
    };
    spinner.finish();

    match result {
        Ok(()) => {
            tracing::info!(project = %id, %action, "Action requested");
            session
                .ui
                .show_info(&format!("Requested {} of {}", action, name));
        }
        Err(e) => {
            tracing::warn!(project = %id, %action, error = %e, "Action failed");
            session
                .ui
                .show_error(&format!("Failed to {} {}: {}", action, name, e));
        }
    }
    Ok(())
}

/// Open a project's app monitor, or the portal of a connection.
pub async fn cmd_open(config: Config, query: Option<&str>) -> Result<()> {
    let session = Session::new(config, false)?;

    let url = match query {
        Some(query) => {
            let Some((connection, handle)) = session.resolve_project(query).await else {
                return Ok(());
            };
            let id = read_project(&handle).id.clone();
            resolve_app_monitor_url(&connection.mc_uri, &id)
        }
        None => {
            session.connect_all().await;
            let Some(connection) = prompt_for_connection(&session.manager, &session.ui, true)?
            else {
                return Ok(());
            };
            connection.mc_uri.clone()
        }
    };

    if let Err(e) = open_in_browser(&url) {
        session.ui.show_error(&format!("{:#}", e));
    }
    Ok(())
}

/// Open the portal page for creating or importing a project.
pub async fn cmd_create(config: Config, import: bool) -> Result<()> {
    let session = Session::new(config, false)?;
    session.connect_all().await;
    let Some(connection) = prompt_for_connection(&session.manager, &session.ui, true)? else {
        return Ok(());
    };

    let url = resolve_create_or_import_url(&connection.mc_uri, !import);
    if let Err(e) = open_in_browser(&url) {
        session.ui.show_error(&format!("{:#}", e));
    }
    Ok(())
}
