// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::{ProcessImpl, TerminalMode};

/// Command-line arguments for `procctl`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procctl",
    version,
    about = "Run external commands under supervision: output capture, hang detection, terminals.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Procctl.toml` in the current working directory if present.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCCTL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a command to completion and exit with its status.
    Run(RunArgs),
    /// Print where an executable would be found.
    Which(WhichArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Seconds without output before the command counts as hanging.
    /// Zero or negative waits forever.
    #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
    pub timeout: Option<i64>,

    /// Working directory of the command.
    #[arg(long, short = 'C', value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Set an environment variable (repeatable).
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Start from an empty environment instead of inheriting ours.
    #[arg(long)]
    pub clear_env: bool,

    /// Run inside a terminal emulator (off, run, keep-open).
    #[arg(long, value_name = "MODE")]
    pub terminal: Option<TerminalMode>,

    /// Process backend (default, direct, launcher).
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<ProcessImpl>,

    /// Deliver stderr on stdout.
    #[arg(long)]
    pub merged: bool,

    /// Wait with an event loop and the inactivity watchdog.
    #[arg(long)]
    pub event_loop: bool,

    /// Run through the elevation command (`sudo -A` unless configured).
    #[arg(long)]
    pub root: bool,

    /// Feed this file to the command's stdin.
    #[arg(long, value_name = "PATH")]
    pub stdin: Option<PathBuf>,

    /// Lower the scheduling priority of the command.
    #[arg(long)]
    pub low_priority: bool,

    /// Output encoding label, overriding `[process].codec`.
    #[arg(long, value_name = "LABEL")]
    pub codec: Option<String>,

    /// Exit codes that count as success (repeatable). Default: 0 only.
    #[arg(long = "success-code", value_name = "CODE", allow_negative_numbers = true)]
    pub success_codes: Vec<i32>,

    /// Stream output line by line while the command runs.
    #[arg(long)]
    pub lines: bool,

    /// Print the equivalent standalone command line and exit.
    #[arg(long)]
    pub dry_run: bool,

    /// The command and its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct WhichArgs {
    /// Executable name.
    pub name: String,

    /// Search list to use instead of `PATH`.
    #[arg(long, value_name = "LIST")]
    pub path: Option<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
