//! Command-line interface.
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{CheckArgs, Cli, Commands, CompletionsArgs, ConfigArgs, LastArgs, RunArgs};
pub use commands::{Command, CommandContext, CommandDispatcher, CommandResult};
