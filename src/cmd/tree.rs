//! `tree`, `watch` and `projects`.

use anyhow::Result;
use console::{Term, style};
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use mctools::config::Config;
use mctools::connection::ConnectionEvent;
use mctools::project::read_project;
use mctools::view::MicroclimateTree;
use mctools::view::render::render_tree;

use super::Session;

pub async fn cmd_tree(config: Config, show_context: bool) -> Result<()> {
    let session = Session::new(config, false)?;
    session.connect_all().await;

    let tree = MicroclimateTree::new(&session.manager);
    print!("{}", render_tree(&tree, show_context).await);
    if session.manager.connections().is_empty() {
        println!(
            "{}",
            style("Run 'mctools connect <url>' to add a Microclimate server.").dim()
        );
    }
    Ok(())
}

/// Redraw the tree on every change pushed by the servers and on a fixed
/// interval, until interrupted.
pub async fn cmd_watch(config: Config, interval: Option<u64>) -> Result<()> {
    let interval = Duration::from_secs(interval.unwrap_or(config.poll_interval_secs()).max(1));
    let session = Session::new(config, true)?;
    let mut events = session.manager.subscribe();
    let term = Term::stdout();

    session.connect_all().await;
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        let tree = MicroclimateTree::new(&session.manager);
        let rendered = render_tree(&tree, false).await;
        let _ = term.clear_screen();
        println!(
            "{} {}",
            style(format!("mctools watch, every {}s", interval.as_secs())).bold(),
            style(format!(
                "(updated {}, Ctrl-C to quit)",
                chrono::Local::now().format("%H:%M:%S")
            ))
            .dim()
        );
        println!();
        print!("{}", rendered);

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                // Servers that were down at startup get another try.
                session.connect_all().await;
                let refreshes: Vec<_> = session
                    .manager
                    .connections()
                    .iter()
                    .filter(|c| c.is_connected())
                    .map(|c| c.force_update_project_list(false))
                    .collect();
                join_all(refreshes).await;
            }
            event = events.recv() => match event {
                Ok(ConnectionEvent::Changed { .. }) | Ok(ConnectionEvent::Removed { .. }) => {}
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.manager.dispose();
    Ok(())
}

pub async fn cmd_projects(config: Config) -> Result<()> {
    let session = Session::new(config, false)?;
    session.connect_all().await;

    for connection in session.manager.connections() {
        println!();
        println!(
            "{} (Microclimate {})",
            style(&connection.mc_uri).bold(),
            connection.version_str
        );
        if !connection.is_connected() {
            println!("  {}", style("Disconnected").red());
            continue;
        }
        let projects = match connection.get_projects().await {
            Ok(projects) => projects,
            Err(e) => {
                println!("  {}", style(format!("Failed to load projects: {}", e)).red());
                continue;
            }
        };
        if projects.is_empty() {
            println!("  {}", style("No projects").dim());
            continue;
        }

        println!(
            "  {}",
            style(format!(
                "{:<24} {:<38} {:<14} {:<10} {}",
                "NAME", "ID", "TYPE", "AUTO-BUILD", "STATE"
            ))
            .dim()
        );
        for handle in &projects {
            let project = read_project(handle);
            println!(
                "  {:<24} {:<38} {:<14} {:<10} {}",
                project.name,
                project.id,
                project.project_type.to_string(),
                if project.auto_build_enabled { "on" } else { "off" },
                project.state
            );
        }
    }
    println!();
    Ok(())
}
