use std::path::Path;
use std::sync::Arc;

use url::Url;

use super::{Project, ProjectHandle, ProjectInfo, write_project};

/// Server actions that mean a project is not real yet, or not any more.
/// Projects can get stuck in these states until the server is restarted.
pub const IGNORED_ACTIONS: &[&str] = &["deleting", "validating"];

/// Merge a freshly fetched project list into the previously held one.
///
/// The result follows the fetch order. A project whose ID was already held
/// keeps its handle and takes the fetched record in place; anything not in `fetched` is
/// dropped.
pub fn reconcile(
    previous: &[ProjectHandle],
    fetched: Vec<ProjectInfo>,
    connection_uri: &Url,
    workspace_path: &Path,
) -> Vec<ProjectHandle> {
    let mut projects = Vec::with_capacity(fetched.len());

    for info in fetched {
        if let Some(action) = info.action.as_deref()
            && IGNORED_ACTIONS.contains(&action)
        {
            tracing::warn!(
                project_id = %info.project_id,
                action,
                "Project is in a bad state and won't be displayed"
            );
            continue;
        }

        let existing = previous
            .iter()
            .find(|p| super::read_project(p).id == info.project_id);

        let handle = match existing {
            Some(handle) => {
                write_project(handle).apply_snapshot(info);
                Arc::clone(handle)
            }
            None => {
                let project = Project::new(info, connection_uri, workspace_path);
                tracing::debug!(project = %project, "New project");
                project.into_handle()
            }
        };
        projects.push(handle);
    }

    projects
}
