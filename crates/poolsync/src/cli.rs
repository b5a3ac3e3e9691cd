//! Clap derive structures for the `poolsync` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

use poolsync_core::{HeatPumpMode, TemperatureUnit};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// poolsync -- talk to a PoolSync pool controller on the local network
#[derive(Debug, Parser)]
#[command(
    name = "poolsync",
    version,
    about = "Pair with, monitor, and control PoolSync pool equipment",
    long_about = "Pair with a PoolSync controller using its push-link button, read\n\
        chlorinator and heat-pump status, and change output, mode, and setpoint.",
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
    /// Device profile to use
    #[arg(long, short = 'p', env = "POOLSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Device IP or host:port (overrides profile)
    #[arg(long, short = 'd', env = "POOLSYNC_DEVICE", global = true)]
    pub device: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "POOLSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Temperature unit the device reports in (overrides profile)
    #[arg(long, short = 'u', global = true)]
    pub unit: Option<TemperatureUnit>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "POOLSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Never read or write the system keyring
    #[arg(long, global = true)]
    pub no_keyring: bool,
}

impl GlobalOpts {
    pub fn use_keyring(&self) -> bool {
        !self.no_keyring
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Pair with a device by pressing its push-link button
    Pair(PairArgs),

    /// Fetch and show the current device status
    #[command(alias = "st")]
    Status,

    /// Change a chlorinator or heat-pump setting
    Set(SetArgs),

    /// Refresh periodically and print each new snapshot
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Pair ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Device IP or host:port (defaults to --device or the profile's address)
    pub device_ip: Option<String>,

    /// Store the access password in the config file instead of the keyring
    #[arg(long)]
    pub plaintext: bool,
}

// ── Set ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    #[command(subcommand)]
    pub command: SetCommand,
}

#[derive(Debug, Subcommand)]
pub enum SetCommand {
    /// Chlorinator output percentage (0-100)
    #[command(alias = "output")]
    ChlorinatorOutput {
        /// Output percentage
        percent: i64,
    },

    /// Heat-pump operating mode
    #[command(alias = "mode")]
    HeatPumpMode {
        /// Mode to switch to
        mode: ModeArg,
    },

    /// Heat-pump setpoint in the device's temperature unit
    Setpoint {
        /// Target water temperature
        #[arg(allow_negative_numbers = true)]
        degrees: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Off,
    Heat,
    Cool,
}

impl From<ModeArg> for HeatPumpMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Off => Self::Off,
            ModeArg::Heat => Self::Heat,
            ModeArg::Cool => Self::Cool,
        }
    }
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between refreshes (minimum 10; defaults to the profile setting)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Stop after this many snapshots
    #[arg(long, short = 'n')]
    pub count: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the current configuration (passwords redacted)
    Show,

    /// Print the config file path
    Path,

    /// Set the refresh interval for a profile
    SetInterval {
        /// Seconds between refreshes (minimum 10)
        seconds: u64,
    },

    /// List configured profiles
    Profiles,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
