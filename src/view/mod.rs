//! Read-only projection of connections and projects into tree items.
//!
//! Nothing here mutates domain state; a host (the terminal renderer, or any
//! other UI) asks [`MicroclimateTree`] for nodes and turns them into
//! [`TreeItem`]s to display.

pub mod render;
pub mod tree;

use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::connection::Connection;
use crate::project::ProjectHandle;

pub use tree::{ContextToken, MicroclimateTree, build_context_value, project_context_tokens};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Microclimate,
    Disconnected,
    Error,
    Java,
    Node,
    Swift,
    Python,
    Go,
    Docker,
}

/// What clicking an item does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeCommand {
    NewDefaultConnection,
    CreateProject { connection: Url },
    RevealInExplorer { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collapsible {
    None,
    Expanded,
}

/// A display-only node that stands in for missing content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderItem {
    pub label: String,
    pub context: ContextToken,
    pub icon: Option<Icon>,
    pub command: Option<TreeCommand>,
}

#[derive(Debug, Clone)]
pub enum TreeNode {
    Connection(Arc<Connection>),
    Project(ProjectHandle),
    Placeholder(PlaceholderItem),
}

/// Everything a host needs to draw one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItem {
    pub label: String,
    pub icon: Option<Icon>,
    pub context_value: String,
    pub tooltip: Option<String>,
    pub collapsible: Collapsible,
    pub command: Option<TreeCommand>,
}
