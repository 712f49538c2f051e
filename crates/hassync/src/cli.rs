//! Clap derive structures for the `hassync` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hassync -- live Home Assistant entity mirror
#[derive(Debug, Parser)]
#[command(
    name = "hassync",
    version,
    about = "Mirror and control Home Assistant entities from the command line",
    long_about = "Maintains a live local mirror of a Home Assistant entity registry\n\
        over the authenticated WebSocket API: snapshot bootstrap, incremental\n\
        state events, and automatic reconnection with backoff.",
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
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "HASSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// WebSocket URL (overrides profile), e.g. ws://homeassistant.local:8123/api/websocket
    #[arg(long, short = 'u', env = "HASSYNC_URL", global = true)]
    pub url: Option<String>,

    /// Long-lived access token
    #[arg(long, env = "HASSYNC_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Seconds to wait for the mirror to go live
    #[arg(long, env = "HASSYNC_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and stream status transitions, entity changes, and alerts
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Print the entity mirror once it is live, grouped by domain
    #[command(alias = "ls")]
    States(StatesArgs),

    /// Send a toggle service call to one entity
    Toggle(ToggleArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Suppress per-change alert lines, keep status and counts
    #[arg(long)]
    pub no_alerts: bool,
}

#[derive(Debug, Args)]
pub struct StatesArgs {
    /// Only show entities in this domain (e.g. light, switch)
    #[arg(long, short = 'd')]
    pub domain: Option<String>,
}

#[derive(Debug, Args)]
pub struct ToggleArgs {
    /// Entity to toggle, e.g. light.kitchen
    pub entity_id: String,

    /// Service to invoke instead of `toggle`
    #[arg(long, default_value = "toggle")]
    pub service: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Write a starter configuration file
    Init,
    /// Print the effective configuration (token redacted)
    Show,
    /// Print the configuration file path
    Path,
}
