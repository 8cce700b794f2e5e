use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pi::config::HarnessConfig;
use pi::errors::HarnessError;
use pi::roster;
use swarm_runtime::{LifecycleConfig, LifecycleController};

#[derive(Parser)]
#[command(name = "pi")]
#[command(version, about = "Swarm coordination harness")]
struct Cli {
    /// Path to an optional pi.toml config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spawn a swarm from a roster file and run it to completion.
    Run {
        /// JSON file listing the agents to spawn.
        roster: PathBuf,

        /// Override the channel group base directory.
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Override the host agent binary command.
        #[arg(long)]
        claude_cmd: Option<String>,

        /// Ask every agent to wrap up after the run completes or Ctrl-C.
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        graceful_shutdown: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            roster,
            base_dir,
            claude_cmd,
            graceful_shutdown,
        } => run_swarm(cli.config, roster, base_dir, claude_cmd, graceful_shutdown).await,
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "pi=debug,swarm_runtime=debug" } else { "pi=info,swarm_runtime=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_swarm(
    config_path: Option<PathBuf>,
    roster_path: PathBuf,
    base_dir: Option<PathBuf>,
    claude_cmd: Option<String>,
    graceful_shutdown: bool,
) -> anyhow::Result<()> {
    let harness_config = HarnessConfig::load(config_path.as_deref(), base_dir, claude_cmd, false)
        .map_err(HarnessError::from)
        .context("failed to load configuration")?;

    let agents = roster::load_roster(&roster_path)
        .map_err(HarnessError::from)
        .context("failed to load roster")?;

    let lifecycle_config = LifecycleConfig {
        base_dir: harness_config.base_dir,
        claude_cmd: harness_config.claude_cmd,
        registration_timeout: std::time::Duration::from_secs(harness_config.registration_timeout_secs),
        shutdown_timeout: std::time::Duration::from_secs(harness_config.shutdown_timeout_secs),
        shutdown_poll: std::time::Duration::from_millis(harness_config.shutdown_poll_ms),
        kill_grace: std::time::Duration::from_secs(harness_config.kill_grace_secs),
        ..Default::default()
    };

    let controller = LifecycleController::new(lifecycle_config);
    controller
        .start_swarm(agents, &Default::default(), None)
        .await
        .map_err(HarnessError::from)
        .context("failed to start swarm")?;

    tokio::select! {
        _ = wait_until_done(&controller) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received Ctrl-C, shutting down swarm");
        }
    }

    if graceful_shutdown {
        controller.graceful_shutdown("Wrap up your work within the next 30 seconds.").await;
    } else {
        controller.cleanup_swarm().await;
    }

    Ok(())
}

async fn wait_until_done(controller: &LifecycleController) {
    loop {
        if !controller.has_active_swarm().await {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }
}
