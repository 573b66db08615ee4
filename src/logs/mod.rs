//! Incremental project logs.
//!
//! The server pushes the whole log on every change. An [`AppLog`] remembers
//! how many characters it already wrote and forwards only the new suffix to
//! its [`LogSink`]. A shorter log than before means the container restarted,
//! so the sink is cleared and the whole content written again.

pub mod manager;
pub mod sink;

use serde::{Deserialize, Serialize};
use std::io;

pub use manager::LogManager;
pub use sink::{BufferSink, ConsoleSink, FileSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    #[default]
    App,
    Build,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Build => "build",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::App => "application",
            Self::Build => "build",
        }
    }
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where log text ends up.
pub trait LogSink: Send {
    fn clear(&mut self) -> io::Result<()>;

    fn append(&mut self, text: &str) -> io::Result<()>;
}

/// What an [`AppLog::update`] did to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogUpdate {
    Unchanged,
    /// This many characters were appended.
    Appended(usize),
    /// The sink was cleared and refilled.
    Reset,
}

pub struct AppLog {
    pub project_id: String,
    pub project_name: String,
    pub log_type: LogType,
    sink: Box<dyn LogSink>,
    initialized: bool,
    /// Characters written since the last clear.
    previous_length: usize,
}

impl std::fmt::Debug for AppLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppLog")
            .field("project_id", &self.project_id)
            .field("log_type", &self.log_type)
            .field("previous_length", &self.previous_length)
            .finish_non_exhaustive()
    }
}

impl AppLog {
    /// Create the log and write the waiting message to `sink`.
    pub fn new(
        project_id: impl Into<String>,
        project_name: impl Into<String>,
        log_type: LogType,
        mut sink: Box<dyn LogSink>,
    ) -> io::Result<Self> {
        let project_name = project_name.into();
        sink.append(&placeholder(&project_name, log_type))?;
        Ok(Self {
            project_id: project_id.into(),
            project_name,
            log_type,
            sink,
            initialized: false,
            previous_length: 0,
        })
    }

    pub fn previous_length(&self) -> usize {
        self.previous_length
    }

    /// Write whatever part of `contents` the sink has not seen yet.
    pub fn update(&mut self, contents: &str) -> io::Result<LogUpdate> {
        let first = !self.initialized;
        if first {
            self.sink.clear()?;
            self.initialized = true;
        }

        let new_length = contents.chars().count();
        let update = if new_length == self.previous_length {
            if first {
                LogUpdate::Reset
            } else {
                LogUpdate::Unchanged
            }
        } else if new_length < self.previous_length {
            tracing::debug!(
                project = %self.project_id,
                log = %self.log_type,
                "Log shrank, rewriting"
            );
            self.sink.clear()?;
            self.sink.append(contents)?;
            LogUpdate::Reset
        } else {
            let offset = contents
                .char_indices()
                .nth(self.previous_length)
                .map_or(contents.len(), |(i, _)| i);
            self.sink.append(&contents[offset..])?;
            if first {
                LogUpdate::Reset
            } else {
                LogUpdate::Appended(new_length - self.previous_length)
            }
        };

        self.previous_length = new_length;
        Ok(update)
    }

    /// Forget everything written. The next update starts from a clean sink.
    pub fn reset(&mut self) -> io::Result<()> {
        self.sink.clear()?;
        self.sink
            .append(&placeholder(&self.project_name, self.log_type))?;
        self.initialized = false;
        self.previous_length = 0;
        Ok(())
    }
}

pub fn placeholder(project_name: &str, log_type: LogType) -> String {
    format!(
        "Waiting for Microclimate to send {} logs for {}...\n",
        log_type.description(),
        project_name
    )
}
