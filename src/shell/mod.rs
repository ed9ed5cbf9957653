//! External command execution and host platform queries.

pub mod command;
pub mod platform;

pub use command::{
    discard_output, echo_output, execute, execute_quiet, execute_streaming,
    CommandOptions, CommandResult, CommandSpec, OutputCallback, OutputLine,
};
pub use platform::{find_on_path, is_ci, is_elevated, resolve_tool_path};
