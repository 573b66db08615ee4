//! Plain-text rendering of the tree for the terminal.

use console::{StyledObject, style};
use std::fmt::Write;

use super::{MicroclimateTree, TreeItem, TreeNode};
use crate::project::{AppState, BuildState, read_project};
use crate::ui::icons::icon_emoji;

/// Render every root and its children, one item per line.
///
/// Children that fail to load are shown as an error line under their parent.
pub async fn render_tree(tree: &MicroclimateTree<'_>, show_context: bool) -> String {
    let mut out = String::new();
    for root in tree.root_items() {
        let item = tree.to_tree_item(&root);
        let _ = writeln!(out, "{}", format_item(&item, style(&item.label).bold(), show_context));

        let children = match tree.children(&root).await {
            Ok(children) => children,
            Err(e) => {
                let _ = writeln!(
                    out,
                    "└── {}",
                    style(format!("Failed to load projects: {}", e)).red()
                );
                continue;
            }
        };
        let count = children.len();
        for (i, child) in children.iter().enumerate() {
            let branch = if i + 1 == count { "└──" } else { "├──" };
            let item = tree.to_tree_item(child);
            let label = styled_label(child, &item);
            let _ = writeln!(out, "{} {}", branch, format_item(&item, label, show_context));
        }
    }
    out
}

fn format_item(item: &TreeItem, label: StyledObject<&String>, show_context: bool) -> String {
    let icon = item.icon.map(|i| icon_emoji(i).to_string()).unwrap_or_default();
    if show_context {
        format!("{}{}  {}", icon, label, style(&item.context_value).dim())
    } else {
        format!("{}{}", icon, label)
    }
}

fn styled_label<'a>(node: &TreeNode, item: &'a TreeItem) -> StyledObject<&'a String> {
    let label = style(&item.label);
    let TreeNode::Project(project) = node else {
        return label.dim();
    };
    let state = read_project(project).state.clone();
    if state.build_state == BuildState::Failed {
        return label.red();
    }
    match state.app_state {
        AppState::Started | AppState::Debugging => label.green(),
        AppState::Starting | AppState::DebugStarting | AppState::Stopping => label.yellow(),
        AppState::Stopped => label.red(),
        AppState::Disabled | AppState::Unknown => label.dim(),
    }
}
