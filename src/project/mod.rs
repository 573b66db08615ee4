//! Projects hosted on a Microclimate server.
//!
//! A [`Project`] is created the first time its ID shows up in a project-list
//! fetch and is then mutated in place on every later fetch or socket event.
//! Callers hold [`ProjectHandle`]s; two handles refer to the same project iff
//! `Arc::ptr_eq` holds.

pub mod info;
pub mod project_type;
pub mod reconcile;
pub mod requests;
pub mod state;

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use url::Url;

pub use info::{ProjectInfo, ProjectPorts};
pub use project_type::{ProjectKind, ProjectType};
pub use reconcile::reconcile;
pub use state::{AppState, BuildState, ProjectState};

/// Shared, mutable reference to a project owned by a connection.
pub type ProjectHandle = Arc<RwLock<Project>>;

#[derive(Debug)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub connection_uri: Url,
    pub project_type: ProjectType,
    pub state: ProjectState,
    pub auto_build_enabled: bool,
    pub local_path: PathBuf,
    pub context_root: Option<String>,
    pub ports: ProjectPorts,
    /// False between a connection drop and the next successful fetch.
    pub connection_alive: bool,
    workspace_path: PathBuf,
    info: ProjectInfo,
}

impl Project {
    pub fn new(info: ProjectInfo, connection_uri: &Url, workspace_path: &Path) -> Self {
        let mut project = Self {
            id: info.project_id.clone(),
            name: String::new(),
            connection_uri: connection_uri.clone(),
            project_type: ProjectType::new(None, None),
            state: ProjectState::unknown(),
            auto_build_enabled: false,
            local_path: PathBuf::new(),
            context_root: None,
            ports: ProjectPorts::default(),
            connection_alive: true,
            workspace_path: workspace_path.to_path_buf(),
            info: ProjectInfo {
                project_id: info.project_id.clone(),
                ..ProjectInfo::default()
            },
        };
        project.apply_snapshot(info);
        project
    }

    pub fn into_handle(self) -> ProjectHandle {
        Arc::new(RwLock::new(self))
    }

    /// Apply a partial record, as pushed by socket events. Fields the record
    /// leaves out keep their values. Records for a different ID are ignored.
    pub fn update(&mut self, info: ProjectInfo) {
        if !self.accepts(&info) {
            return;
        }
        self.info.merge(info);
        self.derive_fields();
    }

    /// Replace the record with a full one from a project-list fetch. Fields
    /// the record leaves out are cleared.
    pub fn apply_snapshot(&mut self, info: ProjectInfo) {
        if !self.accepts(&info) {
            return;
        }
        self.info = info;
        self.derive_fields();
    }

    fn accepts(&self, info: &ProjectInfo) -> bool {
        if info.project_id != self.id {
            tracing::warn!(
                project = %self.id,
                other = %info.project_id,
                "Ignoring update meant for another project"
            );
            return false;
        }
        true
    }

    fn derive_fields(&mut self) {
        let info = &self.info;
        self.name = info.name.clone().unwrap_or_else(|| self.id.clone());
        self.project_type =
            ProjectType::new(info.project_type.as_deref(), info.language.as_deref());
        self.state = ProjectState::from_info(info);
        self.auto_build_enabled = info.auto_build.unwrap_or(false);
        self.context_root = info.context_root.clone();
        self.ports = info.ports.clone().unwrap_or_default();
        self.local_path = local_path_for(&self.workspace_path, info, &self.name);
        self.connection_alive = true;
    }

    pub fn on_connection_reconnect(&mut self) {
        tracing::debug!(project = %self.name, "Connection reestablished");
        self.connection_alive = true;
    }

    /// The server can no longer be asked about this project, so its state is unknown.
    pub fn on_connection_disconnect(&mut self) {
        tracing::debug!(project = %self.name, "Connection lost");
        self.connection_alive = false;
        self.state = ProjectState::unknown();
    }

    /// The raw record this project was last updated from.
    pub fn info(&self) -> &ProjectInfo {
        &self.info
    }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Read-lock a project. A poisoned lock still holds consistent data since
/// every writer replaces whole fields.
pub fn read_project(handle: &ProjectHandle) -> RwLockReadGuard<'_, Project> {
    handle.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn write_project(handle: &ProjectHandle) -> RwLockWriteGuard<'_, Project> {
    handle.write().unwrap_or_else(PoisonError::into_inner)
}

/// Projects live in a directory named after them inside the local workspace.
fn local_path_for(workspace: &Path, info: &ProjectInfo, name: &str) -> PathBuf {
    let dir = info
        .loc_on_disk
        .as_deref()
        .and_then(|loc| Path::new(loc).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    workspace.join(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("http://localhost:9090/").unwrap()
    }

    #[test]
    fn test_new_project_from_info() {
        let mut info = ProjectInfo::new("p1", "nodeapp");
        info.project_type = Some("nodejs".into());
        info.auto_build = Some(true);
        info.loc_on_disk = Some("/microclimate-workspace/nodeapp-dir".into());

        let project = Project::new(info, &uri(), Path::new("/home/dev/mc-workspace"));
        assert_eq!(project.id, "p1");
        assert_eq!(project.name, "nodeapp");
        assert!(project.auto_build_enabled);
        assert_eq!(project.project_type.kind, ProjectKind::Node);
        assert_eq!(
            project.local_path,
            PathBuf::from("/home/dev/mc-workspace/nodeapp-dir")
        );
    }

    #[test]
    fn test_local_path_falls_back_to_name() {
        let project = Project::new(
            ProjectInfo::new("p1", "javaapp"),
            &uri(),
            Path::new("/ws"),
        );
        assert_eq!(project.local_path, PathBuf::from("/ws/javaapp"));
    }

    #[test]
    fn test_update_in_place() {
        let mut project = Project::new(ProjectInfo::new("p1", "A"), &uri(), Path::new("/ws"));
        let mut next = ProjectInfo::new("p1", "A2");
        next.app_status = Some("started".into());
        project.update(next);
        assert_eq!(project.name, "A2");
        assert_eq!(project.state.app_state, AppState::Started);
    }

    #[test]
    fn test_partial_update_keeps_missing_fields() {
        let mut info = ProjectInfo::new("p1", "A");
        info.app_status = Some("started".into());
        info.auto_build = Some(true);
        let mut project = Project::new(info, &uri(), Path::new("/ws"));

        let mut event = ProjectInfo::new("p1", "A");
        event.build_status = Some("inProgress".into());
        project.update(event);
        assert_eq!(project.state.app_state, AppState::Started);
        assert!(project.auto_build_enabled);
        assert!(project.state.is_building());
    }

    #[test]
    fn test_snapshot_clears_missing_fields() {
        let mut info = ProjectInfo::new("p1", "A");
        info.app_status = Some("started".into());
        info.auto_build = Some(true);
        info.context_root = Some("/app".into());
        let mut project = Project::new(info, &uri(), Path::new("/ws"));

        project.apply_snapshot(ProjectInfo::new("p1", "A"));
        assert_eq!(project.state, ProjectState::unknown());
        assert!(!project.auto_build_enabled);
        assert_eq!(project.context_root, None);
        assert_eq!(project.info(), &ProjectInfo::new("p1", "A"));
    }

    #[test]
    fn test_update_for_other_id_is_ignored() {
        let mut project = Project::new(ProjectInfo::new("p1", "A"), &uri(), Path::new("/ws"));
        project.update(ProjectInfo::new("p2", "B"));
        assert_eq!(project.name, "A");
    }

    #[test]
    fn test_disconnect_resets_state() {
        let mut info = ProjectInfo::new("p1", "A");
        info.app_status = Some("started".into());
        let mut project = Project::new(info, &uri(), Path::new("/ws"));
        project.on_connection_disconnect();
        assert!(!project.connection_alive);
        assert_eq!(project.state, ProjectState::unknown());

        project.on_connection_reconnect();
        assert!(project.connection_alive);
    }
}
