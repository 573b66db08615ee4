use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use mctools::config::Config;
use mctools::logging::init_logging;

mod cmd;

#[derive(Parser)]
#[command(name = "mctools")]
#[command(version, about = "Terminal client for Microclimate development servers")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Microclimate server to use instead of the configured connections
    #[arg(long, global = true)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show connections and their projects
    Tree {
        /// Also print each item's context value
        #[arg(long)]
        context: bool,
    },
    /// Keep the tree on screen, refreshing it periodically
    Watch {
        /// Seconds between refreshes (defaults to poll_interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// List projects with their state
    Projects,
    /// Stream a project's logs
    Logs {
        /// Project name or ID
        project: String,
        /// Show build logs instead of application logs
        #[arg(long)]
        build: bool,
        /// Write the log to this file instead of the terminal
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Exit after the first update instead of following
        #[arg(long)]
        once: bool,
    },
    /// Restart a project
    Restart {
        project: String,
        /// Restart in debug mode
        #[arg(long)]
        debug: bool,
        /// With --debug, don't wait for a debugger on startup
        #[arg(long, requires = "debug")]
        no_init: bool,
    },
    /// Request a build
    Build { project: String },
    /// Turn auto-build on or off
    AutoBuild { project: String, state: Toggle },
    /// Enable a disabled project
    Enable { project: String },
    /// Disable a project
    Disable { project: String },
    /// Open a project's app monitor, or the Microclimate portal
    Open { project: Option<String> },
    /// Open the portal page to create (or import) a project
    Create {
        #[arg(long)]
        import: bool,
    },
    /// Remove a project from Microclimate without deleting its files
    Unbind { project: String },
    /// Save a server to the configured connections and connect to it
    Connect { url: Option<String> },
    /// Store an access token for a server
    Login {
        #[arg(long)]
        token: String,
    },
    /// Forget the stored token for a server and disconnect
    Logout,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default config.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.url.clone(), cli.verbose)?;

    // Logging is best-effort; the tools still work without a log file.
    let _log_guard = match init_logging(&config.log_dir(), cli.verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: {:#}", e);
            None
        }
    };

    match cli.command {
        Commands::Config { command } => cmd::cmd_config(&config, command)?,
        Commands::Login { token } => cmd::cmd_login(&config, &token)?,
        Commands::Connect { url } => cmd::cmd_connect(config, url).await?,
        Commands::Tree { context } => cmd::cmd_tree(config, context).await?,
        Commands::Watch { interval } => cmd::cmd_watch(config, interval).await?,
        Commands::Projects => cmd::cmd_projects(config).await?,
        Commands::Logs {
            project,
            build,
            output,
            once,
        } => cmd::cmd_logs(config, &project, build, output, once).await?,
        Commands::Restart {
            project,
            debug,
            no_init,
        } => {
            let mode = match (debug, no_init) {
                (false, _) => cmd::StartMode::Run,
                (true, false) => cmd::StartMode::Debug,
                (true, true) => cmd::StartMode::DebugNoInit,
            };
            cmd::cmd_project_action(config, &project, cmd::ProjectAction::Restart(mode)).await?
        }
        Commands::Build { project } => {
            cmd::cmd_project_action(config, &project, cmd::ProjectAction::Build).await?
        }
        Commands::AutoBuild { project, state } => {
            let action = cmd::ProjectAction::AutoBuild(state == Toggle::On);
            cmd::cmd_project_action(config, &project, action).await?
        }
        Commands::Enable { project } => {
            cmd::cmd_project_action(config, &project, cmd::ProjectAction::Enable).await?
        }
        Commands::Disable { project } => {
            cmd::cmd_project_action(config, &project, cmd::ProjectAction::Disable).await?
        }
        Commands::Unbind { project } => {
            cmd::cmd_project_action(config, &project, cmd::ProjectAction::Unbind).await?
        }
        Commands::Open { project } => cmd::cmd_open(config, project.as_deref()).await?,
        Commands::Create { import } => cmd::cmd_create(config, import).await?,
        Commands::Logout => cmd::cmd_logout(config).await?,
    }

    Ok(())
}
