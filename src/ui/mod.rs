//! Terminal output.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for interactive terminal usage
//! - [`NonInteractiveUI`] for CI/headless environments
//! - [`MockUI`] for capturing output in tests
//!
//! # Example
//!
//! ```
//! use cps_provision::ui::{create_ui, OutputMode};
//!
//! let mut ui = create_ui(false, OutputMode::Quiet);
//! ui.show_header("cps-provision");
//! ui.success("Host provisioned");
//! ```

pub mod mock;
pub mod non_interactive;
pub mod output;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use mock::{MockSpinner, MockUI, Shown};
pub use non_interactive::NonInteractiveUI;
pub use output::OutputMode;
pub use spinner::ProgressSpinner;
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, ProvisionTheme};

use std::time::Duration;

use crate::runner::PipelineResult;
use crate::steps::{StepResult, StepStatus};

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Start a spinner for an operation.
    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Announce a step (`[2/4] upgrade-installer ...`).
    fn show_step(&mut self, index: usize, total: usize, name: &str, description: &str);

    /// Show a contextual hint.
    fn show_hint(&mut self, hint: &str);

    /// Show the end-of-run summary.
    fn show_run_summary(&mut self, summary: &RunSummary);

    /// Check if running in interactive mode.
    fn is_interactive(&self) -> bool;
}

/// Handle for controlling a spinner.
pub trait SpinnerHandle {
    /// Update the spinner message.
    fn set_message(&mut self, msg: &str);

    /// Mark the operation as successful.
    fn finish_success(&mut self, msg: &str);

    /// Mark the operation as failed.
    fn finish_error(&mut self, msg: &str);
}

/// One row of the run summary.
#[derive(Debug, Clone)]
pub struct StepSummary {
    pub name: String,
    pub status: StepStatus,
    pub duration: Option<Duration>,
    pub detail: Option<String>,
}

impl From<&StepResult> for StepSummary {
    fn from(result: &StepResult) -> Self {
        let duration = match result.status {
            StepStatus::NotRun | StepStatus::Planned => None,
            _ => Some(result.duration),
        };
        Self {
            name: result.name.clone(),
            status: result.status,
            duration,
            detail: result.detail.clone(),
        }
    }
}

/// Summary shown at the end of a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub step_results: Vec<StepSummary>,
    pub total_duration: Duration,
    pub success: bool,
    pub dry_run: bool,
    pub failed_step: Option<String>,
    pub error: Option<String>,
}

impl RunSummary {
    /// Build a summary from a pipeline result.
    pub fn from_result(result: &PipelineResult, dry_run: bool) -> Self {
        Self {
            step_results: result.steps.iter().map(StepSummary::from).collect(),
            total_duration: result.duration,
            success: result.success(),
            dry_run,
            failed_step: result.failed_step.clone(),
            error: result.error.as_ref().map(ToString::to_string),
        }
    }

    /// Steps that actually ran.
    pub fn steps_run(&self) -> usize {
        self.step_results
            .iter()
            .filter(|s| !matches!(s.status, StepStatus::NotRun | StepStatus::Planned))
            .count()
    }

    /// Steps left unrun by a failure.
    pub fn steps_not_run(&self) -> usize {
        self.step_results
            .iter()
            .filter(|s| s.status == StepStatus::NotRun)
            .count()
    }

    /// The line printed after the summary table.
    pub fn closing_line(&self) -> String {
        if self.dry_run {
            "Dry run complete, nothing was changed".to_string()
        } else if self.success {
            "Host provisioned".to_string()
        } else {
            format!(
                "Provisioning failed at {}: {}",
                self.failed_step.as_deref().unwrap_or("preflight"),
                self.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;

    fn result() -> PipelineResult {
        PipelineResult {
            steps: vec![
                StepResult::failure(
                    "system-packages",
                    Duration::from_millis(30),
                    "boom".to_string(),
                ),
                StepResult::not_run("dependencies"),
            ],
            failed_step: Some("system-packages".to_string()),
            error: Some(ProvisionError::ToolMissing {
                tool: "tesseract".to_string(),
                hint: "install tesseract-ocr".to_string(),
            }),
            duration: Duration::from_millis(30),
        }
    }

    #[test]
    fn summary_counts_steps() {
        let summary = RunSummary::from_result(&result(), false);
        assert!(!summary.success);
        assert_eq!(summary.steps_run(), 1);
        assert_eq!(summary.steps_not_run(), 1);
        assert!(summary.step_results[1].duration.is_none());
    }

    #[test]
    fn closing_line_names_failed_step() {
        let summary = RunSummary::from_result(&result(), false);
        let line = summary.closing_line();
        assert!(line.contains("system-packages"));
        assert!(line.contains("tesseract"));
    }

    #[test]
    fn closing_line_for_dry_run() {
        let mut summary = RunSummary::from_result(&result(), true);
        summary.success = true;
        assert!(summary.closing_line().contains("Dry run"));
    }
}
