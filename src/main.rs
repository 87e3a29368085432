//! corral — a task runner that executes developer workflows inside
//! container environments.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use corral::cli::{Cli, Commands};
use corral::daemon::BollardDaemon;
use corral::ui::{EventSink, FancyEventSink, SimpleEventSink};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("corral={log_level}").into()),
        )
        .init();

    let exit_code = match &cli.command {
        Commands::Run { task } => run_command(&cli, task).await?,
        Commands::Tasks => tasks_command(&cli)?,
        Commands::Upgrade => {
            println!("corral does not support self-update; install new versions through your package manager.");
            0
        }
    };

    std::process::exit(exit_code);
}

async fn run_command(cli: &Cli, target_task: &str) -> Result<i32> {
    let config = corral::config::load(Path::new(&cli.config_file))
        .with_context(|| format!("failed to load configuration from {}", cli.config_file))?;

    let order = corral::order::resolve(&config, target_task).context("failed to resolve task execution order")?;

    let sink: Arc<dyn EventSink> = if cli.simple_output || cli.quiet {
        Arc::new(SimpleEventSink::new(cli.quiet))
    } else {
        Arc::new(FancyEventSink::new(!cli.no_color))
    };

    let daemon = Arc::new(BollardDaemon::connect().context("failed to connect to the container daemon")?);

    for task_name in &order {
        let task = config
            .tasks
            .get(task_name)
            .expect("order resolver only returns known task names");

        let graph = corral::graph::build(&config, task)
            .with_context(|| format!("failed to build dependency graph for task '{task_name}'"))?;

        sink.on_task_starting(task_name);

        let cancellation = CancellationToken::new();
        let ctrl_c_token = cancellation.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c_token.cancel();
            }
        });

        let raw_exit_code =
            corral::manager::run_task(&graph, daemon.clone(), &config.project_name, sink.clone(), cancellation).await;
        watcher.abort();

        let exit_code = normalize_exit_code(raw_exit_code);
        if exit_code != 0 {
            info!(task = %task_name, exit_code, "task did not complete successfully; stopping before remaining prerequisites");
            return Ok(exit_code);
        }
    }

    Ok(0)
}

fn tasks_command(cli: &Cli) -> Result<i32> {
    let config = corral::config::load(Path::new(&cli.config_file))
        .with_context(|| format!("failed to load configuration from {}", cli.config_file))?;

    let mut names: Vec<&String> = config.tasks.keys().collect();
    names.sort();

    for name in names {
        let task = &config.tasks[name];
        if task.description.is_empty() {
            println!("{name}");
        } else {
            println!("{name}: {}", task.description);
        }
    }

    Ok(0)
}

/// REDESIGN FLAGS: the abstract exit code -1 (task failed before reaching
/// the task container) maps to 1 on this implementation's unsigned-8-bit
/// exit code target platforms.
fn normalize_exit_code(exit_code: i64) -> i32 {
    if exit_code < 0 {
        1
    } else {
        (exit_code & 0xFF) as i32
    }
}
