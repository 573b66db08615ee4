//! Registry of live connections.
//!
//! The manager is built once by the application root and shared as an
//! `Arc`. It owns the connection list, the broadcast channel every
//! connection publishes on, and the receiving end of the socket signal
//! channel.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use url::Url;

use super::client::MicroclimateApi;
use super::environment::Environment;
use super::socket::{self, SocketEvent, SocketSignal};
use super::{ConnectOutcome, Connection, ConnectionEvent, ReconnectVerifier};
use crate::endpoints::normalize_mc_uri;
use crate::errors::{ConnectionError, ProjectError};
use crate::project::{ProjectHandle, read_project};

const EVENT_CAPACITY: usize = 256;

pub struct ConnectionManager {
    api: Arc<dyn MicroclimateApi>,
    connections: RwLock<Vec<Arc<Connection>>>,
    events: broadcast::Sender<ConnectionEvent>,
    signals: mpsc::UnboundedSender<SocketSignal>,
    signal_rx: Mutex<Option<mpsc::UnboundedReceiver<SocketSignal>>>,
    sockets: bool,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connections())
            .field("sockets", &self.sockets)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    pub fn new(api: Arc<dyn MicroclimateApi>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (signals, signal_rx) = mpsc::unbounded_channel();
        Self {
            api,
            connections: RwLock::new(Vec::new()),
            events,
            signals,
            signal_rx: Mutex::new(Some(signal_rx)),
            sockets: false,
        }
    }

    /// Open a socket for every connection added from now on.
    pub fn with_sockets(mut self) -> Self {
        self.sockets = true;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Sender the socket loops report on.
    pub fn signals(&self) -> mpsc::UnboundedSender<SocketSignal> {
        self.signals.clone()
    }

    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find(&self, mc_uri: &Url) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|c| &c.mc_uri == mc_uri)
            .cloned()
    }

    /// Probe the server at `uri`, register a connection for it and connect.
    pub async fn connect(self: &Arc<Self>, uri: &str) -> Result<Arc<Connection>, ConnectionError> {
        let mc_uri = normalize_mc_uri(uri)?;
        if self.find(&mc_uri).is_some() {
            return Err(ConnectionError::AlreadyExists(mc_uri.to_string()));
        }

        tracing::debug!(%mc_uri, "Probing environment");
        let environment = self.api.get_environment(&mc_uri).await?;
        let connection = self.add(mc_uri, &environment)?;
        connection.on_connect(self.as_ref()).await;
        Ok(connection)
    }

    /// Register a connection without connecting it.
    pub fn add(
        &self,
        mc_uri: Url,
        environment: &Environment,
    ) -> Result<Arc<Connection>, ConnectionError> {
        let connection = {
            let mut connections = self
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if connections.iter().any(|c| c.mc_uri == mc_uri) {
                return Err(ConnectionError::AlreadyExists(mc_uri.to_string()));
            }
            let connection = Arc::new(Connection::new(
                mc_uri,
                environment,
                Arc::clone(&self.api),
                self.events.clone(),
            ));
            connections.push(Arc::clone(&connection));
            connection
        };
        tracing::info!(uri = %connection.mc_uri, version = %connection.version_str, "Added connection");

        if self.sockets {
            let handle = socket::spawn_socket(
                connection.mc_uri.clone(),
                &connection.socket_ns,
                self.signals.clone(),
            );
            connection.attach_socket(handle);
        }

        let _ = self.events.send(ConnectionEvent::Changed {
            uri: connection.mc_uri.clone(),
        });
        Ok(connection)
    }

    /// Drop a connection and stop its socket. Returns false if it was not registered.
    pub fn remove(&self, mc_uri: &Url) -> bool {
        let removed = {
            let mut connections = self
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let index = connections.iter().position(|c| &c.mc_uri == mc_uri);
            index.map(|i| connections.remove(i))
        };
        let Some(connection) = removed else {
            return false;
        };
        connection.dispose();
        tracing::info!(uri = %mc_uri, "Removed connection");
        let _ = self.events.send(ConnectionEvent::Removed {
            uri: mc_uri.clone(),
        });
        true
    }

    /// Dispose every connection.
    pub fn dispose(&self) {
        let connections = std::mem::take(
            &mut *self
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for connection in connections {
            connection.dispose();
        }
    }

    /// Route socket signals until the manager is dropped. Only the first
    /// call starts a loop.
    pub fn spawn_signal_loop(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut rx = self
            .signal_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        let manager: Weak<Self> = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.handle_signal(signal).await;
            }
        }))
    }

    pub async fn handle_signal(self: &Arc<Self>, signal: SocketSignal) {
        match signal {
            SocketSignal::Connected { uri } => {
                let Some(connection) = self.find(&uri) else {
                    return;
                };
                if connection.on_connect(self.as_ref()).await == ConnectOutcome::Stale {
                    self.replace_stale(&connection).await;
                }
            }
            SocketSignal::Disconnected { uri } => {
                if let Some(connection) = self.find(&uri) {
                    connection.on_disconnect();
                }
            }
            SocketSignal::Event { uri, event } => {
                if let Some(connection) = self.find(&uri) {
                    self.handle_event(&connection, event);
                }
            }
        }
    }

    fn handle_event(&self, connection: &Arc<Connection>, event: SocketEvent) {
        match event {
            SocketEvent::ProjectChanged(info) | SocketEvent::ProjectStatusChanged(info) => {
                let id = info.project_id.clone();
                if !connection.update_project(info) {
                    tracing::debug!(project = %id, "Change for unknown project, refreshing");
                    connection.force_update_project_list(false);
                }
            }
            SocketEvent::ProjectCreated { project_id } | SocketEvent::ProjectDeleted { project_id } => {
                tracing::debug!(project = %project_id, "Project created or deleted, refreshing");
                connection.force_update_project_list(false);
            }
            SocketEvent::ContainerLogs(logs) => {
                let _ = self.events.send(ConnectionEvent::Logs {
                    uri: connection.mc_uri.clone(),
                    logs,
                });
            }
            SocketEvent::Other { name } => {
                tracing::trace!(event = %name, "Unhandled socket event");
            }
        }
    }

    /// Find a project on any connected server, by ID or else by
    /// case-insensitive name. An ID match wins over name matches.
    pub async fn find_project(
        &self,
        query: &str,
    ) -> Result<(Arc<Connection>, ProjectHandle), ProjectError> {
        let connections: Vec<Arc<Connection>> = self
            .connections()
            .into_iter()
            .filter(|c| c.is_connected())
            .collect();
        if connections.is_empty() {
            return Err(ProjectError::Disconnected {
                connection: self.describe_connections(),
            });
        }

        let mut by_name = Vec::new();
        for connection in &connections {
            for project in connection.get_projects().await? {
                let (id_match, name_match) = {
                    let p = read_project(&project);
                    (p.id == query, p.name.eq_ignore_ascii_case(query))
                };
                if id_match {
                    return Ok((Arc::clone(connection), project));
                }
                if name_match {
                    by_name.push((Arc::clone(connection), project));
                }
            }
        }

        match by_name.len() {
            0 => Err(ProjectError::NotFound {
                query: query.to_string(),
                connection: self.describe_connections(),
            }),
            1 => Ok(by_name.remove(0)),
            _ => Err(ProjectError::Ambiguous {
                query: query.to_string(),
            }),
        }
    }

    fn describe_connections(&self) -> String {
        let uris: Vec<String> = self
            .connections()
            .iter()
            .map(|c| c.mc_uri.to_string())
            .collect();
        if uris.is_empty() {
            "any server".to_string()
        } else {
            uris.join(", ")
        }
    }

    /// The server behind `stale` changed; start over with a fresh connection.
    async fn replace_stale(self: &Arc<Self>, stale: &Arc<Connection>) {
        let uri = stale.mc_uri.clone();
        self.remove(&uri);
        match self.connect(uri.as_str()).await {
            Ok(_) => tracing::info!(%uri, "Replaced stale connection"),
            Err(e) => tracing::warn!(%uri, error = %e, "Failed to replace stale connection"),
        }
    }
}

#[async_trait]
impl ReconnectVerifier for ConnectionManager {
    async fn verify_reconnect(&self, connection: &Connection) -> bool {
        if !connection.has_connected() {
            return true;
        }
        match self.api.get_environment(&connection.mc_uri).await {
            Ok(environment) => connection.matches_environment(&environment),
            Err(e) => {
                // Can't tell, so assume the server is unchanged.
                tracing::warn!(uri = %connection.mc_uri, error = %e, "Environment check failed on reconnect");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::socket::ContainerLogs;
    use crate::connection::tests::{FakeApi, environment, uri};
    use crate::logs::LogType;
    use crate::project::ProjectInfo;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;

    fn manager(api: Arc<FakeApi>) -> Arc<ConnectionManager> {
        Arc::new(ConnectionManager::new(api))
    }

    #[tokio::test]
    async fn test_connect_registers_and_fetches() {
        let api = Arc::new(FakeApi::new(vec![ProjectInfo::new("1", "A")]));
        let manager = manager(api.clone());

        let connection = manager.connect("localhost:9090").await.unwrap();
        assert_eq!(connection.mc_uri, uri());
        assert!(connection.is_connected());
        assert_eq!(connection.get_projects().await.unwrap().len(), 1);
        assert_eq!(manager.connections().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_connect_is_rejected() {
        let api = Arc::new(FakeApi::new(vec![]));
        let manager = manager(api);
        manager.connect("http://localhost:9090").await.unwrap();
        let err = manager.connect("http://localhost:9090/").await.unwrap_err();
        assert!(matches!(err, ConnectionError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_not_added() {
        let api = Arc::new(FakeApi::new(vec![]));
        api.fail.store(true, Ordering::SeqCst);
        let manager = manager(api);
        assert!(manager.connect("http://localhost:9090").await.is_err());
        assert!(manager.connections().is_empty());
    }

    #[tokio::test]
    async fn test_remove_disposes_and_notifies() {
        let api = Arc::new(FakeApi::new(vec![ProjectInfo::new("1", "A")]));
        let manager = manager(api);
        let mut rx = manager.subscribe();
        let connection = manager.connect("http://localhost:9090").await.unwrap();

        assert!(manager.remove(&uri()));
        assert!(!connection.is_connected());
        assert!(manager.find(&uri()).is_none());
        assert!(!manager.remove(&uri()));

        let mut saw_removed = false;
        while let Ok(event) = rx.try_recv() {
            saw_removed |= matches!(event, ConnectionEvent::Removed { .. });
        }
        assert!(saw_removed);
    }

    #[tokio::test]
    async fn test_socket_disconnect_and_reconnect() {
        let api = Arc::new(FakeApi::new(vec![ProjectInfo::new("1", "A")]));
        let manager = manager(api);
        let connection = manager.connect("http://localhost:9090").await.unwrap();
        connection.get_projects().await.unwrap();

        manager
            .handle_signal(SocketSignal::Disconnected { uri: uri() })
            .await;
        assert!(!connection.is_connected());
        assert!(connection.cached_projects().is_empty());

        manager
            .handle_signal(SocketSignal::Connected { uri: uri() })
            .await;
        assert!(connection.is_connected());
        assert_eq!(connection.get_projects().await.unwrap().len(), 1);
        assert!(Arc::ptr_eq(&manager.find(&uri()).unwrap(), &connection));
    }

    #[tokio::test]
    async fn test_reconnect_to_changed_server_replaces_connection() {
        let api = Arc::new(FakeApi::new(vec![]));
        let manager = manager(api.clone());
        let original = manager.connect("http://localhost:9090").await.unwrap();

        manager
            .handle_signal(SocketSignal::Disconnected { uri: uri() })
            .await;
        api.environment.lock().unwrap().workspace_path = PathBuf::from("/new-ws");
        manager
            .handle_signal(SocketSignal::Connected { uri: uri() })
            .await;

        let replacement = manager.find(&uri()).unwrap();
        assert!(!Arc::ptr_eq(&replacement, &original));
        assert_eq!(replacement.workspace_path, PathBuf::from("/new-ws"));
        assert!(replacement.is_connected());
        assert!(!original.is_connected());
        assert_eq!(manager.connections().len(), 1);
    }

    #[tokio::test]
    async fn test_project_changed_updates_in_place() {
        let api = Arc::new(FakeApi::new(vec![ProjectInfo::new("1", "A")]));
        let manager = manager(api.clone());
        let connection = manager.connect("http://localhost:9090").await.unwrap();
        let project = connection.get_projects().await.unwrap().remove(0);

        let mut info = ProjectInfo::new("1", "A");
        info.build_status = Some("inProgress".into());
        manager
            .handle_signal(SocketSignal::Event {
                uri: uri(),
                event: SocketEvent::ProjectStatusChanged(info),
            })
            .await;

        assert!(read_project(&project).state.is_building());
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_project_creation_triggers_refresh() {
        let api = Arc::new(FakeApi::new(vec![ProjectInfo::new("1", "A")]));
        let manager = manager(api.clone());
        let connection = manager.connect("http://localhost:9090").await.unwrap();
        connection.get_projects().await.unwrap();

        api.set_projects(vec![ProjectInfo::new("1", "A"), ProjectInfo::new("2", "B")]);
        manager
            .handle_signal(SocketSignal::Event {
                uri: uri(),
                event: SocketEvent::ProjectCreated {
                    project_id: "2".into(),
                },
            })
            .await;

        assert_eq!(connection.get_projects().await.unwrap().len(), 2);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn test_container_logs_are_broadcast() {
        let api = Arc::new(FakeApi::new(vec![]));
        let manager = manager(api);
        manager.connect("http://localhost:9090").await.unwrap();
        let mut rx = manager.subscribe();

        let logs = ContainerLogs {
            project_id: "1".into(),
            log_type: LogType::App,
            contents: "hello".into(),
        };
        manager
            .handle_signal(SocketSignal::Event {
                uri: uri(),
                event: SocketEvent::ContainerLogs(logs.clone()),
            })
            .await;

        let mut received = None;
        while let Ok(event) = rx.try_recv() {
            if let ConnectionEvent::Logs { logs, .. } = event {
                received = Some(logs);
            }
        }
        assert_eq!(received, Some(logs));
    }

    #[tokio::test]
    async fn test_signal_loop_routes_signals() {
        let api = Arc::new(FakeApi::new(vec![]));
        let manager = manager(api);
        let connection = manager.connect("http://localhost:9090").await.unwrap();
        let handle = manager.spawn_signal_loop().unwrap();
        assert!(manager.spawn_signal_loop().is_none());

        manager
            .signals()
            .send(SocketSignal::Disconnected { uri: uri() })
            .unwrap();
        while connection.is_connected() {
            tokio::task::yield_now().await;
        }
        handle.abort();
    }

    #[tokio::test]
    async fn test_verifier_accepts_first_connect_and_same_server() {
        let api = Arc::new(FakeApi::new(vec![]));
        let manager = manager(api);
        let connection = manager.add(uri(), &environment()).unwrap();
        assert!(manager.verify_reconnect(&connection).await);
    }

    #[tokio::test]
    async fn test_find_project_by_id_or_name() {
        let api = Arc::new(FakeApi::new(vec![
            ProjectInfo::new("id-1", "NodeApp"),
            ProjectInfo::new("id-2", "javaapp"),
        ]));
        let manager = manager(api);
        manager.connect("http://localhost:9090").await.unwrap();

        let (_, by_id) = manager.find_project("id-2").await.unwrap();
        assert_eq!(read_project(&by_id).name, "javaapp");

        let (connection, by_name) = manager.find_project("nodeapp").await.unwrap();
        assert_eq!(read_project(&by_name).id, "id-1");
        assert_eq!(connection.mc_uri, uri());

        let err = manager.find_project("missing").await.unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_project_ambiguous_name() {
        let api = Arc::new(FakeApi::new(vec![
            ProjectInfo::new("id-1", "app"),
            ProjectInfo::new("id-2", "App"),
        ]));
        let manager = manager(api);
        manager.connect("http://localhost:9090").await.unwrap();

        let err = manager.find_project("app").await.unwrap_err();
        assert!(matches!(err, ProjectError::Ambiguous { .. }));
        assert!(manager.find_project("id-2").await.is_ok());
    }

    #[tokio::test]
    async fn test_find_project_without_connections() {
        let manager = manager(Arc::new(FakeApi::new(vec![])));
        let err = manager.find_project("x").await.unwrap_err();
        assert!(matches!(err, ProjectError::Disconnected { .. }));
    }
}
