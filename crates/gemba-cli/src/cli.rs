//! Clap derive structures for the `gemba` CLI.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// gemba -- live shop-floor production monitoring from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "gemba",
    version,
    about = "Watch live production dashboards from the command line",
    long_about = "Subscribes to a MES production-monitoring WebSocket channel and\n\
        renders the pushed dashboard snapshots: device availability, production\n\
        counts and rates, per-device telemetry, and active alarms.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "GEMBA_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server base URL (overrides profile)
    #[arg(long, short = 'u', env = "GEMBA_URL", global = true)]
    pub url: Option<String>,

    /// Bearer token for the WebSocket handshake
    #[arg(long, env = "GEMBA_AUTH_TOKEN", global = true, hide_env = true)]
    pub auth_token: Option<String>,

    /// Delay between reconnection attempts, in milliseconds
    #[arg(long, env = "GEMBA_RETRY_DELAY_MS", global = true)]
    pub retry_delay_ms: Option<u64>,

    /// Reconnection attempt bound; 0 retries forever
    #[arg(long, env = "GEMBA_RETRY_MAX_ATTEMPTS", global = true)]
    pub retry_max_attempts: Option<u32>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream dashboard snapshots until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Fetch one snapshot and exit
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Emit one JSON object per snapshot instead of the summary view
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Emit the snapshot as pretty-printed JSON
    #[arg(long)]
    pub json: bool,

    /// Give up after this many seconds without a snapshot
    #[arg(long, default_value = "60")]
    pub timeout: u64,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,
    /// Print the effective configuration
    Show,
    /// Write a starter config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
