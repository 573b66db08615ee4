//! `logs`: stream a project's application or build log.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

use mctools::config::Config;
use mctools::connection::ConnectionEvent;
use mctools::logs::{ConsoleSink, FileSink, LogManager, LogSink, LogType};
use mctools::project::read_project;

use super::Session;

pub async fn cmd_logs(
    config: Config,
    query: &str,
    build: bool,
    output: Option<PathBuf>,
    once: bool,
) -> Result<()> {
    let follow = !once && config.toml.defaults.follow_logs;
    let session = Session::new(config, true)?;
    let mut events = session.manager.subscribe();

    let Some((connection, handle)) = session.resolve_project(query).await else {
        return Ok(());
    };
    let (id, name) = {
        let project = read_project(&handle);
        (project.id.clone(), project.name.clone())
    };

    let log_type = if build { LogType::Build } else { LogType::App };
    let sink: Box<dyn LogSink> = match &output {
        Some(path) => Box::new(
            FileSink::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?,
        ),
        None => Box::new(ConsoleSink::new(format!("{} {} log", name, log_type))),
    };
    let mut logs = LogManager::new();
    logs.open(&id, &name, log_type, sink)
        .context("Failed to write log output")?;

    if follow {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = logs.run(events, Some(&connection.mc_uri)) => {}
        }
    } else {
        loop {
            let event = tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(ConnectionEvent::Logs { uri, logs: pushed }) if uri == connection.mc_uri => {
                    let update = logs
                        .on_container_logs(&pushed)
                        .context("Failed to write log output")?;
                    if update.is_some() {
                        break;
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    }

    if let Some(path) = output {
        println!("Log written to {}", path.display());
    }
    session.manager.dispose();
    Ok(())
}
