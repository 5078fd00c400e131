use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arrsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Declarative configuration sync for Sonarr, Radarr, Lidarr, Readarr and Whisparr",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $ARRSYNC_CONFIG_DIR/config.toml)
    #[arg(short, long, global = true, env = "ARRSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile servers with the config
    Sync(SyncArgs),

    /// Show what sync would change, without changing anything
    Diff(DiffArgs),

    /// Validate the config and test connectivity
    Check(CheckArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct SyncArgs {
    /// Only this instance
    #[arg(short, long)]
    pub instance: Option<String>,

    /// Plan and print, change nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Delete unmanaged resources without asking
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Only this instance
    #[arg(short, long)]
    pub instance: Option<String>,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Only this instance
    #[arg(short, long)]
    pub instance: Option<String>,

    /// Validate the config without contacting any server
    #[arg(long)]
    pub offline: bool,
}
