//! CLI surface (§6, §10): `run`/`tasks`/`--version`/`--upgrade`, mirroring
//! the ambient stack's `clap::Parser`-derived entry point.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "corral")]
#[command(about = "Runs developer tasks inside container environments")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file.
    #[arg(short = 'f', long = "config-file", global = true, default_value = "batect.yml")]
    pub config_file: String,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Use the simple, line-at-a-time output format.
    #[arg(long, global = true)]
    pub simple_output: bool,

    /// Suppress non-essential output.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Skip the update notification (no-op; self-update is out of scope).
    #[arg(long, global = true)]
    pub no_update_notification: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a task and its prerequisites.
    Run {
        /// Name of the task to run.
        task: String,
    },
    /// List the tasks defined in the configuration file.
    Tasks,
    /// Check for a newer version of this tool.
    Upgrade,
}
