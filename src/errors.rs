//! Typed error hierarchy for mctools.
//!
//! Three top-level enums cover the three subsystems:
//! - `ConnectionError`: REST transport and server-identity failures
//! - `ProjectError`: lookups and actions on a single project
//! - `SocketError`: the socket.io event channel

use thiserror::Error;

/// Errors talking to a Microclimate server over REST.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Invalid Microclimate URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("Unexpected response from {url}: {message}")]
    BadResponse { url: String, message: String },

    #[error("Microclimate version {found} is not supported, {required} or newer is required")]
    UnsupportedVersion { found: String, required: String },

    #[error("Already connected to {0}")]
    AlreadyExists(String),

    #[error("No connection to {0}")]
    NotFound(String),
}

/// Errors from a single project lookup or action.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("No project matching '{query}' on {connection}")]
    NotFound { query: String, connection: String },

    #[error("Project name '{query}' is ambiguous, use the project ID instead")]
    Ambiguous { query: String },

    #[error("{connection} is not connected")]
    Disconnected { connection: String },

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Errors from the socket event channel.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Failed to open socket to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },

    #[error("Malformed socket frame '{frame}': {message}")]
    Malformed { frame: String, message: String },

    #[error("Socket closed by server")]
    Closed,
}
