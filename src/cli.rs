// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `agentplan`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "agentplan",
    version,
    about = "Run a dependency-ordered plan of agent tasks with human approval.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    ///
    /// Default: `Agentplan.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Agentplan.toml")]
    pub plan: String,

    /// Goal to decompose. Overrides `[plan].goal` from the plan file.
    #[arg(long, value_name = "TEXT")]
    pub goal: Option<String>,

    /// Project anchor date (YYYY-MM-DD). Overrides `[config].anchor`.
    #[arg(long, value_name = "DATE")]
    pub anchor: Option<chrono::NaiveDate>,

    /// Exit once nothing is running and only human decisions (if any) remain.
    #[arg(long)]
    pub once: bool,

    /// Act as an unattended operator: approve every approval request and
    /// complete simulated work as soon as it reaches 100%.
    #[arg(long)]
    pub auto_approve: bool,

    /// Ignore any persisted state and start the plan from scratch.
    #[arg(long)]
    pub fresh: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `AGENTPLAN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the timeline, but don't execute any task.
    #[arg(long)]
    pub dry_run: bool,
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
