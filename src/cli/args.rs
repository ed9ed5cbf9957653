//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// cps-provision - Prepare a host to run the Check Print System backend.
#[derive(Debug, Parser)]
#[command(name = "cps-provision")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides <project>/provision.yml)
    #[arg(short, long, global = true, env = "CPS_PROVISION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Provision the host (default if no command specified)
    Run(RunArgs),

    /// Report what is and isn't provisioned, without changing anything
    Check(CheckArgs),

    /// Show resolved configuration
    Config(ConfigArgs),

    /// Show the last run record
    Last(LastArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Print the planned commands without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Leave the package installer at its current version
    #[arg(long)]
    pub skip_upgrade: bool,
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CheckArgs {}

/// Arguments for the `config` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long, conflicts_with = "schema")]
    pub json: bool,

    /// Print the JSON Schema of the configuration file
    #[arg(long)]
    pub schema: bool,
}

/// Arguments for the `last` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct LastArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
