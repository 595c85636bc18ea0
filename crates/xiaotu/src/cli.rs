//! Clap derive structures for the `xiaotu` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// xiaotu -- open and watch XiaoTu community doors
#[derive(Debug, Parser)]
#[command(
    name = "xiaotu",
    version,
    about = "Control XiaoTu smart door locks from the command line",
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
    /// Account profile to use
    #[arg(long, short = 'p', env = "XIAOTU_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Vendor host URL (overrides profile)
    #[arg(long, env = "XIAOTU_HOST", global = true)]
    pub host: Option<String>,

    /// WeChat openid (overrides profile)
    #[arg(long, env = "XIAOTU_OPENID", global = true)]
    pub openid: Option<String>,

    /// Client id (overrides profile and keyring)
    #[arg(long, env = "XIAOTU_CLIENT_ID", global = true, hide_env = true)]
    pub client_id: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "XIAOTU_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "XIAOTU_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate credentials and cache a session in the profile
    Login(LoginArgs),

    /// List the doors of the account
    #[command(alias = "ls")]
    Doors,

    /// Release a door latch
    Unlock(DoorArgs),

    /// Mark a door as locking until it reports back
    Lock(DoorArgs),

    /// Poll the account and print changes until interrupted
    Watch(WatchArgs),

    /// Capture anonymized backend responses for a bug report
    Diagnostics,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Store the client id in the system keyring
    #[arg(long)]
    pub store_client_id: bool,
}

#[derive(Debug, Args)]
pub struct DoorArgs {
    /// Door id (case-insensitive)
    pub id: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Polling interval in seconds (defaults to the profile's)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}
