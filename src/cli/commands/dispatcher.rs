//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands, RunArgs};
use crate::config::{load_config, validate, LoadedConfig};
use crate::error::Result;
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Where a command finds its project and configuration.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Project directory; relative config paths resolve against it.
    pub project_root: PathBuf,
    /// Explicit configuration file (`--config`).
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    /// Create a context.
    pub fn new(project_root: PathBuf, config_path: Option<PathBuf>) -> Self {
        Self {
            project_root,
            config_path,
        }
    }

    /// Load and validate the configuration.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = load_config(&self.project_root, self.config_path.as_deref())?;
        validate(&loaded.config)?;
        Ok(loaded)
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    context: CommandContext,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given project root.
    pub fn new(project_root: PathBuf, config_path: Option<PathBuf>) -> Self {
        Self {
            context: CommandContext::new(project_root, config_path),
        }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.context.project_root
    }

    /// Dispatch and execute a command.
    ///
    /// No subcommand runs the full provisioning pipeline.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let context = self.context.clone();
        match &cli.command {
            Some(Commands::Run(args)) => super::run::RunCommand::new(context, args.clone()).execute(ui),
            Some(Commands::Check(_)) => super::check::CheckCommand::new(context).execute(ui),
            Some(Commands::Config(args)) => {
                super::config::ConfigCommand::new(context, args.clone()).execute(ui)
            }
            Some(Commands::Last(args)) => {
                super::last::LastCommand::new(context, args.clone()).execute(ui)
            }
            Some(Commands::Completions(args)) => {
                super::completions::CompletionsCommand::new(args.clone()).execute(ui)
            }
            None => super::run::RunCommand::new(context, RunArgs::default()).execute(ui),
        }
    }
}
