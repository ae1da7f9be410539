//! CLI argument parsing using clap derive API
//!
//! Purely declarative. Scenario names are kept as strings here and resolved
//! against the catalogue by the `run` handler so unknown names get a domain error.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// vpngw -- integration scenarios for the VPN gateway terraform module.
///
/// Use `vpngw <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "vpngw", version, about, long_about = None)]
pub struct Cli {
    /// Path to the vpngw.toml configuration file.
    #[arg(short, long, global = true, default_value = "vpngw.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one or more scenarios.
    Run(RunArgs),

    /// List the scenario catalogue.
    List,

    /// Destroy a stack that was preserved after a failure.
    Destroy(DestroyArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario names (single-site, multiple-connections, vpc-to-vpc).
    pub scenarios: Vec<String>,

    /// Run every scenario in the catalogue.
    #[arg(long, conflicts_with = "scenarios")]
    pub all: bool,

    /// Assemble and validate scenario options without calling terraform.
    #[arg(long)]
    pub dry_run: bool,
}

// ---- destroy ----

#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Preserved working directory printed by the failed run.
    #[arg(long)]
    pub dir: PathBuf,

    /// Workspace name (the stack prefix).
    #[arg(long)]
    pub workspace: String,
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, terraform, suite, permanent).
        #[arg(long)]
        section: Option<String>,
    },
}
