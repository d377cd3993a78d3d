//! Clap derive structures for the `caseta` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// caseta -- pair with and control a Lutron Caseta Smart Bridge
#[derive(Debug, Parser)]
#[command(
    name = "caseta",
    version,
    about = "Pair with and control Lutron Caseta lighting",
    long_about = "Pair with a Lutron Caseta Smart Bridge, then list and control its\n\
        lights, switches, shades, and fans. `caseta serve` exposes the same\n\
        operations as JSON-RPC tools over stdio.\n\n\
        Settings come from the config file, LUTRON_* environment variables,\n\
        and the flags below, in increasing order of precedence.",
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
    /// Bridge IP address (overrides config)
    #[arg(long, short = 'b', global = true)]
    pub bridge_ip: Option<String>,

    /// Directory holding the bridge certificates (overrides config)
    #[arg(long, global = true)]
    pub cert_dir: Option<PathBuf>,

    /// Per-command bridge timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
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
    /// Pair with a bridge (press the button on the bridge when asked)
    Pair(PairArgs),

    /// Show bridge address, certificate files, and connection state
    #[command(alias = "st")]
    Status(StatusArgs),

    /// List devices in one domain
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Turn a device on
    On(DeviceArgs),

    /// Turn a device off
    Off(DeviceArgs),

    /// Set a device level (0-100)
    Level(LevelArgs),

    /// Serve the tools as JSON-RPC 2.0 over stdio
    Serve,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Per-command arguments ────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Bridge IP address
    pub host: String,

    /// Where to write the certificates (defaults to the configured cert dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Do not record the bridge IP in the config file
    #[arg(long)]
    pub no_save: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Try to connect before reporting
    #[arg(long)]
    pub probe: bool,
}

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Device domain: light, switch, cover, sensor, fan
    #[arg(long, short = 'd', default_value = "light")]
    pub domain: String,
}

#[derive(Debug, Args)]
pub struct DeviceArgs {
    /// Device id as shown by `caseta devices`
    pub device_id: String,
}

#[derive(Debug, Args)]
pub struct LevelArgs {
    /// Device id as shown by `caseta devices`
    pub device_id: String,

    /// Level, 0 (off) to 100 (full)
    #[arg(allow_negative_numbers = true)]
    pub level: i64,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
