use std::sync::Arc;

use super::{Collapsible, Icon, PlaceholderItem, TreeCommand, TreeItem, TreeNode};
use crate::connection::{Connection, ConnectionManager};
use crate::errors::ConnectionError;
use crate::project::{Project, read_project};

/// Prefix of every context value.
pub const CONTEXT_BASE: &str = "ext.mc";

/// One dot-separated part of a context value. Hosts match on the full
/// value to decide which commands apply to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextToken {
    NoProjects,
    NoConnections,
    Disconnected,
    ConnectionConnected,
    ConnectionDisconnected,
    Project,
    Enabled,
    Disabled,
    Started,
    Debuggable,
    AutoBuildOn,
    AutoBuildOff,
}

impl ContextToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoProjects => "noProjects",
            Self::NoConnections => "noConnections",
            Self::Disconnected => "disconnected",
            Self::ConnectionConnected => "connection.connected",
            Self::ConnectionDisconnected => "connection",
            Self::Project => "project",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Started => "started",
            Self::Debuggable => "debuggable",
            Self::AutoBuildOn => "autoBuildOn",
            Self::AutoBuildOff => "autoBuildOff",
        }
    }
}

/// `ext.mc.<token>.<token>...`
pub fn build_context_value(tokens: &[ContextToken]) -> String {
    let mut value = CONTEXT_BASE.to_string();
    for token in tokens {
        value.push('.');
        value.push_str(token.as_str());
    }
    value
}

/// Order is fixed: project, enablement (with started and debuggable), auto-build.
pub fn project_context_tokens(project: &Project) -> Vec<ContextToken> {
    let mut tokens = vec![ContextToken::Project];
    if project.state.is_enabled() {
        tokens.push(ContextToken::Enabled);
        if project.state.is_started() {
            tokens.push(ContextToken::Started);
        }
        if project.state.is_debuggable() {
            tokens.push(ContextToken::Debuggable);
        }
    } else {
        tokens.push(ContextToken::Disabled);
    }
    tokens.push(if project.auto_build_enabled {
        ContextToken::AutoBuildOn
    } else {
        ContextToken::AutoBuildOff
    });
    tokens
}

/// Tree data provider over a [`ConnectionManager`].
pub struct MicroclimateTree<'a> {
    manager: &'a ConnectionManager,
}

impl<'a> MicroclimateTree<'a> {
    pub fn new(manager: &'a ConnectionManager) -> Self {
        Self { manager }
    }

    pub fn root_items(&self) -> Vec<TreeNode> {
        let connections = self.manager.connections();
        if connections.is_empty() {
            return vec![TreeNode::Placeholder(PlaceholderItem {
                label: "No connections (Click to connect)".to_string(),
                context: ContextToken::NoConnections,
                icon: None,
                command: Some(TreeCommand::NewDefaultConnection),
            })];
        }
        connections.into_iter().map(TreeNode::Connection).collect()
    }

    /// Children of a node. Listing a connected connection's projects may fetch them.
    pub async fn children(&self, node: &TreeNode) -> Result<Vec<TreeNode>, ConnectionError> {
        let TreeNode::Connection(connection) = node else {
            return Ok(Vec::new());
        };
        if !connection.is_connected() {
            return Ok(vec![TreeNode::Placeholder(PlaceholderItem {
                label: "Disconnected".to_string(),
                context: ContextToken::Disconnected,
                icon: Some(Icon::Error),
                command: None,
            })]);
        }

        let mut projects = connection.get_projects().await?;
        if projects.is_empty() {
            return Ok(vec![TreeNode::Placeholder(PlaceholderItem {
                label: "No projects (Click to create a project)".to_string(),
                context: ContextToken::NoProjects,
                icon: None,
                command: Some(TreeCommand::CreateProject {
                    connection: connection.mc_uri.clone(),
                }),
            })]);
        }
        projects.sort_by_cached_key(|p| {
            let project = read_project(p);
            (project.name.to_lowercase(), project.id.clone())
        });
        Ok(projects.into_iter().map(TreeNode::Project).collect())
    }

    pub fn to_tree_item(&self, node: &TreeNode) -> TreeItem {
        match node {
            TreeNode::Connection(connection) => connection_item(connection),
            TreeNode::Project(project) => project_item(&read_project(project)),
            TreeNode::Placeholder(placeholder) => TreeItem {
                label: placeholder.label.clone(),
                icon: placeholder.icon,
                context_value: build_context_value(&[placeholder.context]),
                tooltip: None,
                collapsible: Collapsible::None,
                command: placeholder.command.clone(),
            },
        }
    }
}

fn connection_item(connection: &Arc<Connection>) -> TreeItem {
    let connected = connection.is_connected();
    let mut label = format!("Microclimate @ {}", connection.mc_uri);
    if connected && connection.cached_projects().is_empty() {
        label.push_str(" (No projects)");
    }
    let (icon, token) = if connected {
        (Icon::Microclimate, ContextToken::ConnectionConnected)
    } else {
        (Icon::Disconnected, ContextToken::ConnectionDisconnected)
    };
    TreeItem {
        label,
        icon: Some(icon),
        context_value: build_context_value(&[token]),
        tooltip: Some(format!(
            "Version: {}\nWorkspace: {}",
            connection.version_str,
            connection.workspace_path.display()
        )),
        collapsible: Collapsible::Expanded,
        command: None,
    }
}

fn project_item(project: &Project) -> TreeItem {
    TreeItem {
        label: format!("{} [{}]", project.name, project.state),
        icon: Some(project.project_type.icon()),
        context_value: build_context_value(&project_context_tokens(project)),
        tooltip: Some(format!(
            "{}\n{}\n{}",
            project.id,
            project.project_type,
            project.local_path.display()
        )),
        collapsible: Collapsible::None,
        command: Some(TreeCommand::RevealInExplorer {
            path: project.local_path.clone(),
        }),
    }
}
