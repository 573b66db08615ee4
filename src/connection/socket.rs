//! socket.io event channel to a Microclimate server.
//!
//! Microclimate pushes project and log events over socket.io 2 (engine.io
//! protocol 3) on a WebSocket transport. Only the text frames this client
//! needs are handled:
//!
//! ```text
//! 0{"sid":..,"pingInterval":..}   engine.io open handshake
//! 2 / 3                           ping / pong (client pings, server pongs)
//! 40/ns,                          socket.io connect to namespace
//! 42/ns,["event",{...}]           socket.io event
//! ```
//!
//! The socket loop reconnects forever and reports connect, disconnect and
//! event signals over an mpsc channel to whoever owns the connections.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::errors::SocketError;
use crate::logs::LogType;
use crate::project::ProjectInfo;

/// Delay between reconnect attempts after the socket drops.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
const DEFAULT_PING_TIMEOUT_MS: u64 = 60_000;

const PING: &str = "2";
const PONG: &str = "3";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

fn default_ping_timeout() -> u64 {
    DEFAULT_PING_TIMEOUT_MS
}

/// One engine.io frame.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// A socket.io packet carried in an engine.io message frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        name: String,
        payload: Value,
    },
    Ack {
        namespace: String,
    },
    Error {
        namespace: String,
        message: String,
    },
}

/// Full log contents pushed for a project on every change.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerLogs {
    #[serde(rename = "projectID")]
    pub project_id: String,
    #[serde(default)]
    pub log_type: LogType,
    #[serde(default)]
    pub contents: String,
}

#[derive(Debug, Deserialize)]
struct ProjectRef {
    #[serde(rename = "projectID")]
    project_id: String,
}

/// Server events the tools react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    ProjectChanged(ProjectInfo),
    ProjectStatusChanged(ProjectInfo),
    ProjectCreated { project_id: String },
    ProjectDeleted { project_id: String },
    ContainerLogs(ContainerLogs),
    Other { name: String },
}

impl SocketEvent {
    pub fn from_event(name: &str, payload: Value) -> Result<Self, SocketError> {
        let malformed = |e: serde_json::Error| SocketError::Malformed {
            frame: name.to_string(),
            message: e.to_string(),
        };
        let event = match name {
            "projectChanged" => {
                Self::ProjectChanged(serde_json::from_value(payload).map_err(malformed)?)
            }
            "projectStatusChanged" | "projectClosed" => {
                Self::ProjectStatusChanged(serde_json::from_value(payload).map_err(malformed)?)
            }
            "projectCreation" => {
                let r: ProjectRef = serde_json::from_value(payload).map_err(malformed)?;
                Self::ProjectCreated {
                    project_id: r.project_id,
                }
            }
            "projectDeletion" => {
                let r: ProjectRef = serde_json::from_value(payload).map_err(malformed)?;
                Self::ProjectDeleted {
                    project_id: r.project_id,
                }
            }
            "container-logs" => {
                Self::ContainerLogs(serde_json::from_value(payload).map_err(malformed)?)
            }
            other => Self::Other {
                name: other.to_string(),
            },
        };
        Ok(event)
    }
}

/// What the socket loop reports to the connection owner.
#[derive(Debug, Clone)]
pub enum SocketSignal {
    Connected { uri: Url },
    Disconnected { uri: Url },
    Event { uri: Url, event: SocketEvent },
}

fn malformed(frame: &str, message: impl ToString) -> SocketError {
    SocketError::Malformed {
        frame: frame.to_string(),
        message: message.to_string(),
    }
}

/// Parse one engine.io text frame.
pub fn parse_frame(frame: &str) -> Result<EnginePacket, SocketError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or_else(|| malformed(frame, "empty frame"))?;
    let body = chars.as_str();
    match kind {
        '0' => serde_json::from_str(body)
            .map(EnginePacket::Open)
            .map_err(|e| malformed(frame, e)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => parse_socket_packet(frame, body).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        _ => Err(malformed(frame, "unknown engine.io packet type")),
    }
}

fn parse_socket_packet(frame: &str, body: &str) -> Result<SocketPacket, SocketError> {
    let mut chars = body.chars();
    let kind = chars
        .next()
        .ok_or_else(|| malformed(frame, "empty socket.io packet"))?;
    let mut rest = chars.as_str();

    let namespace = if rest.starts_with('/') {
        let (ns, after) = match rest.find(',') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };
        rest = after;
        ns.to_string()
    } else {
        "/".to_string()
    };

    // Ack IDs are not used by this client.
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let data: Value = serde_json::from_str(rest).map_err(|e| malformed(frame, e))?;
            let mut items = match data {
                Value::Array(items) if !items.is_empty() => items.into_iter(),
                _ => return Err(malformed(frame, "event data is not a non-empty array")),
            };
            let name = match items.next() {
                Some(Value::String(name)) => name,
                _ => return Err(malformed(frame, "event name is not a string")),
            };
            let payload = items.next().unwrap_or(Value::Null);
            Ok(SocketPacket::Event {
                namespace,
                name,
                payload,
            })
        }
        '3' => Ok(SocketPacket::Ack { namespace }),
        '4' => Ok(SocketPacket::Error {
            namespace,
            message: rest.trim_matches('"').to_string(),
        }),
        '5' | '6' => Err(malformed(frame, "binary packets are not supported")),
        _ => Err(malformed(frame, "unknown socket.io packet type")),
    }
}

/// Namespaces always start with `/`; an empty namespace is the root.
pub fn normalize_namespace(namespace: &str) -> String {
    if namespace.is_empty() {
        "/".to_string()
    } else if namespace.starts_with('/') {
        namespace.to_string()
    } else {
        format!("/{}", namespace)
    }
}

/// Frame asking the server to join `namespace`.
pub fn connect_frame(namespace: &str) -> String {
    format!("40{},", namespace)
}

/// `ws(s)://host/<base>/socket.io/?EIO=3&transport=websocket`
pub fn socket_url(mc_uri: &Url) -> Result<Url, SocketError> {
    let mut url = mc_uri
        .join("socket.io/")
        .map_err(|e| malformed(mc_uri.as_str(), e))?;
    let scheme = if mc_uri.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|_| malformed(mc_uri.as_str(), "cannot convert to a websocket URL"))?;
    url.set_query(Some("EIO=3&transport=websocket"));
    Ok(url)
}

/// Spawn the socket loop for a connection. Abort the handle to stop it.
pub fn spawn_socket(
    mc_uri: Url,
    namespace: &str,
    signals: mpsc::UnboundedSender<SocketSignal>,
) -> JoinHandle<()> {
    let namespace = normalize_namespace(namespace);
    tokio::spawn(run_socket(mc_uri, namespace, signals))
}

async fn run_socket(
    mc_uri: Url,
    namespace: String,
    signals: mpsc::UnboundedSender<SocketSignal>,
) {
    let url = match socket_url(&mc_uri) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(%mc_uri, error = %e, "Cannot open socket");
            return;
        }
    };

    loop {
        match run_session(&mc_uri, &url, &namespace, &signals).await {
            Ok(()) => tracing::info!(%url, "Socket closed"),
            Err(e) => tracing::debug!(%url, error = %e, "Socket session ended"),
        }
        if signals.is_closed() {
            break;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// One WebSocket session, from handshake to close.
async fn run_session(
    mc_uri: &Url,
    url: &Url,
    namespace: &str,
    signals: &mpsc::UnboundedSender<SocketSignal>,
) -> Result<(), SocketError> {
    let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| SocketError::Connect {
            url: url.to_string(),
            source: Box::new(e),
        })?;
    let (mut sender, mut receiver) = ws.split();
    tracing::debug!(%url, "Socket open");

    let mut ping_interval =
        tokio::time::interval(Duration::from_millis(DEFAULT_PING_INTERVAL_MS));
    ping_interval.tick().await;
    let mut pong_timeout = Duration::from_millis(DEFAULT_PING_TIMEOUT_MS);
    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;
    let mut joined = false;

    let result = loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > pong_timeout {
                    break Err(SocketError::Closed);
                }
                if sender.send(Message::Text(PING.into())).await.is_err() {
                    break Err(SocketError::Closed);
                }
                awaiting_pong = true;
            }

            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break Ok(()),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        break Err(SocketError::Connect {
                            url: url.to_string(),
                            source: Box::new(e),
                        })
                    }
                };

                let packet = match parse_frame(&text) {
                    Ok(packet) => packet,
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring socket frame");
                        continue;
                    }
                };

                match packet {
                    EnginePacket::Open(handshake) => {
                        ping_interval = tokio::time::interval(Duration::from_millis(
                            handshake.ping_interval.max(1),
                        ));
                        ping_interval.tick().await;
                        pong_timeout = Duration::from_millis(
                            handshake.ping_interval + handshake.ping_timeout,
                        );
                        if namespace != "/"
                            && sender
                                .send(Message::Text(connect_frame(namespace)))
                                .await
                                .is_err()
                        {
                            break Err(SocketError::Closed);
                        }
                    }
                    EnginePacket::Ping => {
                        if sender.send(Message::Text(PONG.into())).await.is_err() {
                            break Err(SocketError::Closed);
                        }
                    }
                    EnginePacket::Pong => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    EnginePacket::Close => break Ok(()),
                    EnginePacket::Message(packet) => {
                        match packet {
                            SocketPacket::Connect { namespace: ns } if ns == namespace => {
                                joined = true;
                                let _ = signals.send(SocketSignal::Connected { uri: mc_uri.clone() });
                            }
                            SocketPacket::Disconnect { namespace: ns } if ns == namespace => {
                                break Ok(());
                            }
                            SocketPacket::Event { namespace: ns, name, payload } if ns == namespace => {
                                match SocketEvent::from_event(&name, payload) {
                                    Ok(event) => {
                                        let _ = signals.send(SocketSignal::Event {
                                            uri: mc_uri.clone(),
                                            event,
                                        });
                                    }
                                    Err(e) => tracing::warn!(error = %e, "Ignoring socket event"),
                                }
                            }
                            SocketPacket::Error { message, .. } => {
                                tracing::warn!(%url, message, "Socket error packet");
                            }
                            _ => {}
                        }
                    }
                    EnginePacket::Upgrade | EnginePacket::Noop => {}
                }
            }
        }
    };

    if joined {
        let _ = signals.send(SocketSignal::Disconnected {
            uri: mc_uri.clone(),
        });
    }
    let _ = sender.send(Message::Close(None)).await;
    result
}
