//! Connections to Microclimate servers.
//!
//! A [`Connection`] is one server endpoint. It cycles through
//! `Disconnected -> Connecting -> Connected -> Disconnected`, owns the
//! projects last fetched from the server and publishes every change on a
//! broadcast channel shared with its [`ConnectionManager`].

pub mod auth;
pub mod client;
pub mod environment;
pub mod manager;
pub mod socket;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;

pub use client::{MicroclimateApi, MicroclimateClient};
pub use environment::Environment;
pub use manager::ConnectionManager;

use crate::endpoints::host_key;
use crate::errors::ConnectionError;
use crate::project::{ProjectHandle, ProjectInfo, read_project, reconcile, write_project};
use environment::version_to_string;
use socket::ContainerLogs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Result of [`Connection::on_connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// Already connected or connecting; nothing was done.
    AlreadyConnected,
    /// The server is no longer the one this connection was created for.
    /// The connection stays disconnected and should be replaced.
    Stale,
}

/// Change notifications published by connections and the manager.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Connected { uri: Url, reconnect: bool },
    Disconnected { uri: Url },
    /// Something displayable about the connection or its projects changed.
    Changed { uri: Url },
    /// A project-list fetch completed and was applied.
    ProjectsUpdated { uri: Url },
    Removed { uri: Url },
    Logs { uri: Url, logs: ContainerLogs },
}

impl ConnectionEvent {
    pub fn uri(&self) -> &Url {
        match self {
            Self::Connected { uri, .. }
            | Self::Disconnected { uri }
            | Self::Changed { uri }
            | Self::ProjectsUpdated { uri }
            | Self::Removed { uri }
            | Self::Logs { uri, .. } => uri,
        }
    }
}

/// Decides whether a connection coming back up still talks to the same server.
#[async_trait]
pub trait ReconnectVerifier: Send + Sync {
    async fn verify_reconnect(&self, connection: &Connection) -> bool;
}

struct ConnectionState {
    status: ConnectionStatus,
    has_connected: bool,
    projects: Vec<ProjectHandle>,
    /// Bumped for every refresh request.
    requested_refresh: u64,
    /// Generation of the last applied fetch; `None` before the first one.
    completed_refresh: Option<u64>,
}

impl ConnectionState {
    fn needs_refresh(&self) -> bool {
        self.completed_refresh
            .is_none_or(|done| done < self.requested_refresh)
    }
}

pub struct Connection {
    pub mc_uri: Url,
    pub host: String,
    pub version: u32,
    pub version_str: String,
    pub socket_ns: String,
    pub workspace_path: PathBuf,
    api: Arc<dyn MicroclimateApi>,
    events: broadcast::Sender<ConnectionEvent>,
    state: RwLock<ConnectionState>,
    /// Serializes fetch-and-apply of the project list.
    refresh_lock: tokio::sync::Mutex<()>,
    socket: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("mc_uri", &self.mc_uri.as_str())
            .field("version", &self.version_str)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mc_uri)
    }
}

impl Connection {
    pub fn new(
        mc_uri: Url,
        environment: &Environment,
        api: Arc<dyn MicroclimateApi>,
        events: broadcast::Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            host: host_key(&mc_uri),
            mc_uri,
            version: environment.version,
            version_str: version_to_string(environment.version),
            socket_ns: environment.socket_namespace.clone(),
            workspace_path: environment.workspace_path.clone(),
            api,
            events,
            state: RwLock::new(ConnectionState {
                status: ConnectionStatus::Disconnected,
                has_connected: false,
                projects: Vec::new(),
                requested_refresh: 0,
                completed_refresh: None,
            }),
            refresh_lock: tokio::sync::Mutex::new(()),
            socket: Mutex::new(None),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ConnectionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ConnectionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ConnectionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn changed(&self) {
        self.emit(ConnectionEvent::Changed {
            uri: self.mc_uri.clone(),
        });
    }

    pub fn status(&self) -> ConnectionStatus {
        self.read_state().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Whether this connection ever completed a connect.
    pub fn has_connected(&self) -> bool {
        self.read_state().has_connected
    }

    /// True when `environment` describes the server this connection was built for.
    pub fn matches_environment(&self, environment: &Environment) -> bool {
        self.version == environment.version
            && self.workspace_path == environment.workspace_path
            && self.socket_ns == environment.socket_namespace
    }

    pub async fn on_connect(self: &Arc<Self>, verifier: &dyn ReconnectVerifier) -> ConnectOutcome {
        {
            let mut state = self.write_state();
            if state.status != ConnectionStatus::Disconnected {
                tracing::debug!(uri = %self.mc_uri, "Already connected");
                return ConnectOutcome::AlreadyConnected;
            }
            state.status = ConnectionStatus::Connecting;
        }

        if !verifier.verify_reconnect(self).await {
            tracing::info!(uri = %self.mc_uri, "Server changed since last connect");
            self.write_state().status = ConnectionStatus::Disconnected;
            return ConnectOutcome::Stale;
        }

        let reconnect = {
            let mut state = self.write_state();
            let reconnect = state.has_connected;
            if reconnect {
                for project in &state.projects {
                    write_project(project).on_connection_reconnect();
                }
            }
            state.has_connected = true;
            state.status = ConnectionStatus::Connected;
            reconnect
        };
        tracing::info!(uri = %self.mc_uri, reconnect, "Connected");

        self.force_update_project_list(false);
        self.emit(ConnectionEvent::Connected {
            uri: self.mc_uri.clone(),
            reconnect,
        });
        self.changed();
        ConnectOutcome::Connected
    }

    pub fn on_disconnect(&self) {
        let projects = {
            let mut state = self.write_state();
            if state.status == ConnectionStatus::Disconnected {
                return;
            }
            state.status = ConnectionStatus::Disconnected;
            std::mem::take(&mut state.projects)
        };
        for project in &projects {
            write_project(project).on_connection_disconnect();
        }
        tracing::info!(uri = %self.mc_uri, "Disconnected");

        self.emit(ConnectionEvent::Disconnected {
            uri: self.mc_uri.clone(),
        });
        self.changed();
    }

    /// The project list, fetched from the server only when a refresh was
    /// requested or no fetch has completed yet.
    ///
    /// A disconnected connection never fetches and has no projects.
    pub async fn get_projects(&self) -> Result<Vec<ProjectHandle>, ConnectionError> {
        if !self.read_state().needs_refresh() {
            return Ok(self.cached_projects());
        }

        let _guard = self.refresh_lock.lock().await;
        let generation = {
            let state = self.read_state();
            if !state.needs_refresh() || state.status != ConnectionStatus::Connected {
                return Ok(state.projects.clone());
            }
            state.requested_refresh
        };

        tracing::debug!(uri = %self.mc_uri, generation, "Fetching project list");
        let fetched = self.api.get_projects(&self.mc_uri).await?;

        let projects = {
            let mut state = self.write_state();
            if state.status != ConnectionStatus::Connected {
                tracing::debug!(uri = %self.mc_uri, "Discarding project list fetched after disconnect");
                return Ok(state.projects.clone());
            }
            state.projects = reconcile(
                &state.projects,
                fetched,
                &self.mc_uri,
                &self.workspace_path,
            );
            state.completed_refresh = Some(generation);
            state.projects.clone()
        };
        tracing::debug!(uri = %self.mc_uri, count = projects.len(), "Project list updated");

        self.emit(ConnectionEvent::ProjectsUpdated {
            uri: self.mc_uri.clone(),
        });
        self.changed();
        Ok(projects)
    }

    /// Request a refresh and start it in the background. `wipe` drops the
    /// current list first so stale projects disappear right away.
    pub fn force_update_project_list(self: &Arc<Self>, wipe: bool) -> JoinHandle<()> {
        {
            let mut state = self.write_state();
            state.requested_refresh += 1;
            if wipe {
                state.projects.clear();
            }
        }
        if wipe {
            self.changed();
        }

        let connection = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = connection.get_projects().await {
                tracing::warn!(uri = %connection.mc_uri, error = %e, "Project list refresh failed");
            }
        })
    }

    /// Projects held right now, without fetching.
    pub fn cached_projects(&self) -> Vec<ProjectHandle> {
        self.read_state().projects.clone()
    }

    pub fn get_project_by_id(&self, project_id: &str) -> Option<ProjectHandle> {
        self.read_state()
            .projects
            .iter()
            .find(|p| read_project(p).id == project_id)
            .cloned()
    }

    /// Apply a record pushed by the server. Returns false when no held
    /// project has that ID.
    pub fn update_project(&self, info: ProjectInfo) -> bool {
        let Some(project) = self.get_project_by_id(&info.project_id) else {
            return false;
        };
        write_project(&project).update(info);
        self.changed();
        true
    }

    pub(crate) fn attach_socket(&self, handle: JoinHandle<()>) {
        let mut socket = self.socket.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = socket.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the socket and drop all projects.
    pub fn dispose(&self) {
        if let Some(socket) = self
            .socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            socket.abort();
        }
        self.on_disconnect();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// In-process stand-in for a Microclimate server.
    pub(crate) struct FakeApi {
        pub environment: Mutex<Environment>,
        pub projects: Mutex<Vec<ProjectInfo>>,
        pub fail: AtomicBool,
        pub calls: AtomicUsize,
        /// When set, each project fetch waits for a permit after reading its response.
        pub gate: Option<Semaphore>,
    }

    impl FakeApi {
        pub fn new(projects: Vec<ProjectInfo>) -> Self {
            Self {
                environment: Mutex::new(environment()),
                projects: Mutex::new(projects),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        pub fn gated(projects: Vec<ProjectInfo>) -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Self::new(projects)
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn set_projects(&self, projects: Vec<ProjectInfo>) {
            *self.projects.lock().unwrap() = projects;
        }
    }

    #[async_trait]
    impl MicroclimateApi for FakeApi {
        async fn get_environment(&self, mc_uri: &Url) -> Result<Environment, ConnectionError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ConnectionError::Status {
                    url: mc_uri.to_string(),
                    status: 503,
                });
            }
            Ok(self.environment.lock().unwrap().clone())
        }

        async fn get_projects(&self, mc_uri: &Url) -> Result<Vec<ProjectInfo>, ConnectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self.projects.lock().unwrap().clone();
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(ConnectionError::Status {
                    url: mc_uri.to_string(),
                    status: 503,
                });
            }
            Ok(response)
        }
    }

    pub(crate) fn environment() -> Environment {
        Environment {
            version: 1905,
            workspace_path: PathBuf::from("/ws"),
            socket_namespace: "/default".into(),
        }
    }

    pub(crate) fn uri() -> Url {
        Url::parse("http://localhost:9090/").unwrap()
    }

    struct Verifier(bool);

    #[async_trait]
    impl ReconnectVerifier for Verifier {
        async fn verify_reconnect(&self, _connection: &Connection) -> bool {
            self.0
        }
    }

    fn connection(api: Arc<FakeApi>) -> (Arc<Connection>, broadcast::Receiver<ConnectionEvent>) {
        let (tx, rx) = broadcast::channel(64);
        let conn = Connection::new(uri(), &environment(), api, tx);
        (Arc::new(conn), rx)
    }

    fn ids(projects: &[ProjectHandle]) -> Vec<String> {
        projects.iter().map(|p| read_project(p).id.clone()).collect()
    }

    fn drain(rx: &mut broadcast::Receiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn wait_for_calls(api: &FakeApi, n: usize) {
        while api.calls() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_connect_fetches_once_then_caches() {
        let api = Arc::new(FakeApi::new(vec![
            ProjectInfo::new("1", "A"),
            ProjectInfo::new("2", "B"),
        ]));
        let (conn, mut rx) = connection(api.clone());

        assert_eq!(conn.on_connect(&Verifier(true)).await, ConnectOutcome::Connected);
        let first = conn.get_projects().await.unwrap();
        let second = conn.get_projects().await.unwrap();

        assert_eq!(ids(&first), vec!["1", "2"]);
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert_eq!(api.calls(), 1);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            ConnectionEvent::Connected { reconnect: false, .. }
        )));
    }

    #[tokio::test]
    async fn test_second_connect_is_noop() {
        let api = Arc::new(FakeApi::new(vec![]));
        let (conn, _rx) = connection(api);
        assert_eq!(conn.on_connect(&Verifier(true)).await, ConnectOutcome::Connected);
        assert_eq!(
            conn.on_connect(&Verifier(true)).await,
            ConnectOutcome::AlreadyConnected
        );
    }

    #[tokio::test]
    async fn test_stale_connection_stays_disconnected() {
        let api = Arc::new(FakeApi::new(vec![ProjectInfo::new("1", "A")]));
        let (conn, _rx) = connection(api.clone());

        assert_eq!(conn.on_connect(&Verifier(false)).await, ConnectOutcome::Stale);
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);
        assert!(!conn.has_connected());
        assert!(conn.get_projects().await.unwrap().is_empty());
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_discards_projects() {
        let api = Arc::new(FakeApi::new(vec![ProjectInfo::new("1", "A")]));
        let (conn, mut rx) = connection(api.clone());
        conn.on_connect(&Verifier(true)).await;
        let held = conn.get_projects().await.unwrap();
        drain(&mut rx);

        conn.on_disconnect();
        assert!(conn.cached_projects().is_empty());
        assert!(!read_project(&held[0]).connection_alive);
        assert!(conn.get_projects().await.unwrap().is_empty());

        let events = drain(&mut rx);
        assert!(matches!(events[0], ConnectionEvent::Disconnected { .. }));
        assert!(matches!(events[1], ConnectionEvent::Changed { .. }));

        // Second disconnect is a no-op.
        conn.on_disconnect();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_repopulates() {
        let api = Arc::new(FakeApi::new(vec![ProjectInfo::new("1", "A")]));
        let (conn, mut rx) = connection(api.clone());
        conn.on_connect(&Verifier(true)).await;
        conn.get_projects().await.unwrap();
        conn.on_disconnect();
        drain(&mut rx);

        api.set_projects(vec![ProjectInfo::new("1", "A"), ProjectInfo::new("3", "C")]);
        assert_eq!(conn.on_connect(&Verifier(true)).await, ConnectOutcome::Connected);
        let projects = conn.get_projects().await.unwrap();
        assert_eq!(ids(&projects), vec!["1", "3"]);
        assert_eq!(api.calls(), 2);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            ConnectionEvent::Connected { reconnect: true, .. }
        )));
    }

    #[tokio::test]
    async fn test_refresh_during_fetch_is_not_lost() {
        let api = Arc::new(FakeApi::gated(vec![ProjectInfo::new("1", "A")]));
        let (conn, _rx) = connection(api.clone());

        conn.on_connect(&Verifier(true)).await;
        wait_for_calls(&api, 1).await;

        // The in-flight fetch already read the old list.
        api.set_projects(vec![ProjectInfo::new("2", "B")]);
        conn.force_update_project_list(false);
        api.gate.as_ref().unwrap().add_permits(2);

        let projects = conn.get_projects().await.unwrap();
        assert_eq!(ids(&projects), vec!["2"]);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_finishing_after_disconnect_is_discarded() {
        let api = Arc::new(FakeApi::gated(vec![ProjectInfo::new("1", "A")]));
        let (conn, _rx) = connection(api.clone());

        conn.on_connect(&Verifier(true)).await;
        wait_for_calls(&api, 1).await;
        conn.on_disconnect();
        api.gate.as_ref().unwrap().add_permits(1);

        assert!(conn.get_projects().await.unwrap().is_empty());
        assert!(conn.cached_projects().is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried_on_next_call() {
        let api = Arc::new(FakeApi::new(vec![ProjectInfo::new("1", "A")]));
        api.fail.store(true, Ordering::SeqCst);
        let (conn, _rx) = connection(api.clone());
        conn.on_connect(&Verifier(true)).await;

        // Let the background refresh fail first.
        wait_for_calls(&api, 1).await;
        tokio::task::yield_now().await;
        assert!(conn.get_projects().await.is_err());

        api.fail.store(false, Ordering::SeqCst);
        let projects = conn.get_projects().await.unwrap();
        assert_eq!(ids(&projects), vec!["1"]);
    }

    #[tokio::test]
    async fn test_wipe_clears_before_refresh() {
        let api = Arc::new(FakeApi::gated(vec![ProjectInfo::new("1", "A")]));
        let (conn, _rx) = connection(api.clone());
        conn.on_connect(&Verifier(true)).await;
        api.gate.as_ref().unwrap().add_permits(1);
        conn.get_projects().await.unwrap();
        assert_eq!(conn.cached_projects().len(), 1);

        let refresh = conn.force_update_project_list(true);
        assert!(conn.cached_projects().is_empty());

        api.gate.as_ref().unwrap().add_permits(1);
        refresh.await.unwrap();
        assert_eq!(ids(&conn.cached_projects()), vec!["1"]);
    }

    #[tokio::test]
    async fn test_get_project_by_id_and_update() {
        let api = Arc::new(FakeApi::new(vec![ProjectInfo::new("1", "A")]));
        let (conn, _rx) = connection(api);
        conn.on_connect(&Verifier(true)).await;
        conn.get_projects().await.unwrap();

        assert!(conn.get_project_by_id("missing").is_none());
        let project = conn.get_project_by_id("1").unwrap();

        let mut pushed = ProjectInfo::new("1", "A");
        pushed.app_status = Some("started".into());
        assert!(conn.update_project(pushed));
        assert!(read_project(&project).state.is_started());
        assert!(!conn.update_project(ProjectInfo::new("9", "Z")));
    }

    #[test]
    fn test_matches_environment() {
        let api = Arc::new(FakeApi::new(vec![]));
        let (conn, _rx) = connection(api);
        assert!(conn.matches_environment(&environment()));

        let mut moved = environment();
        moved.workspace_path = PathBuf::from("/elsewhere");
        assert!(!conn.matches_environment(&moved));
    }
}
