use std::collections::HashMap;
use std::io;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use url::Url;

use super::{AppLog, LogSink, LogType, LogUpdate};
use crate::connection::ConnectionEvent;
use crate::connection::socket::ContainerLogs;

type LogKey = (String, LogType);

/// Routes pushed log contents to the matching [`AppLog`].
///
/// Logs are opened explicitly per project and log type; contents for logs
/// nobody opened are dropped.
#[derive(Debug, Default)]
pub struct LogManager {
    logs: HashMap<LogKey, AppLog>,
}

impl LogManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a log unless it is already open.
    pub fn open(
        &mut self,
        project_id: &str,
        project_name: &str,
        log_type: LogType,
        sink: Box<dyn LogSink>,
    ) -> io::Result<()> {
        let key = (project_id.to_string(), log_type);
        if self.logs.contains_key(&key) {
            return Ok(());
        }
        let log = AppLog::new(project_id, project_name, log_type, sink)?;
        tracing::debug!(project = %project_id, log = %log_type, "Opened log");
        self.logs.insert(key, log);
        Ok(())
    }

    pub fn is_open(&self, project_id: &str, log_type: LogType) -> bool {
        self.logs.contains_key(&(project_id.to_string(), log_type))
    }

    pub fn close(&mut self, project_id: &str, log_type: LogType) -> bool {
        self.logs
            .remove(&(project_id.to_string(), log_type))
            .is_some()
    }

    /// Feed pushed contents to their log. `None` when no such log is open.
    pub fn on_container_logs(&mut self, logs: &ContainerLogs) -> io::Result<Option<LogUpdate>> {
        match self
            .logs
            .get_mut(&(logs.project_id.clone(), logs.log_type))
        {
            Some(log) => log.update(&logs.contents).map(Some),
            None => {
                tracing::trace!(project = %logs.project_id, log = %logs.log_type, "No open log");
                Ok(None)
            }
        }
    }

    /// Start every log over, e.g. after the server came back.
    pub fn reset_all(&mut self) -> io::Result<()> {
        for log in self.logs.values_mut() {
            log.reset()?;
        }
        Ok(())
    }

    /// Consume connection events until the channel closes. Only events for
    /// `uri` are handled when it is given.
    pub async fn run(&mut self, mut events: broadcast::Receiver<ConnectionEvent>, uri: Option<&Url>) {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    // The next push carries the full log again.
                    tracing::warn!(skipped, "Log event receiver lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if uri.is_some_and(|uri| uri != event.uri()) {
                continue;
            }

            let result = match &event {
                ConnectionEvent::Logs { logs, .. } => self.on_container_logs(logs).map(|_| ()),
                ConnectionEvent::Connected {
                    reconnect: true, ..
                } => self.reset_all(),
                _ => Ok(()),
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to write log output");
            }
        }
    }
}
