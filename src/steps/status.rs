//! Step outcomes and results.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status of a step in a provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step changed the host.
    Completed,

    /// Step found nothing to do.
    Unchanged,

    /// Step tolerated a failure and the run continued.
    Warned,

    /// Step failed; the run stopped here.
    Failed,

    /// Step never started because an earlier step failed.
    NotRun,

    /// Dry run: step was planned only.
    Planned,
}

impl StepStatus {
    /// Whether the run may continue past a step with this status.
    pub fn is_ok(&self) -> bool {
        !matches!(self, StepStatus::Failed | StepStatus::NotRun)
    }

    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            StepStatus::Completed => '✓',
            StepStatus::Unchanged => '✓',
            StepStatus::Warned => '⚠',
            StepStatus::Failed => '✗',
            StepStatus::NotRun => '⊘',
            StepStatus::Planned => '○',
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Completed => "completed",
            StepStatus::Unchanged => "unchanged",
            StepStatus::Warned => "warned",
            StepStatus::Failed => "failed",
            StepStatus::NotRun => "not run",
            StepStatus::Planned => "planned",
        };
        write!(f, "{}", s)
    }
}

/// What a successful step reports back to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Completed, Unchanged or Warned.
    pub status: StepStatus,
    /// One-line summary.
    pub detail: String,
}

impl StepOutcome {
    /// The step changed the host.
    pub fn completed(detail: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Completed,
            detail: detail.into(),
        }
    }

    /// Nothing to do.
    pub fn unchanged(detail: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Unchanged,
            detail: detail.into(),
        }
    }

    /// Failure tolerated.
    pub fn warned(detail: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Warned,
            detail: detail.into(),
        }
    }
}

/// Result of one step in a run.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Step name.
    pub name: String,

    /// Final status.
    pub status: StepStatus,

    /// Execution duration.
    pub duration: Duration,

    /// Summary, planned commands, or the error message.
    pub detail: Option<String>,
}

impl StepResult {
    /// Result for a step that returned an outcome.
    pub fn from_outcome(name: &str, outcome: StepOutcome, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            status: outcome.status,
            duration,
            detail: Some(outcome.detail),
        }
    }

    /// Create a failure result.
    pub fn failure(name: &str, duration: Duration, error: String) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Failed,
            duration,
            detail: Some(error),
        }
    }

    /// A step skipped because the run already stopped.
    pub fn not_run(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::NotRun,
            duration: Duration::ZERO,
            detail: None,
        }
    }

    /// A dry-run plan.
    pub fn planned(name: &str, commands: &[String]) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Planned,
            duration: Duration::ZERO,
            detail: (!commands.is_empty()).then(|| commands.join("\n")),
        }
    }

    /// Format for display.
    pub fn format_summary(&self) -> String {
        let c = self.status.display_char();
        match self.status {
            StepStatus::Completed | StepStatus::Warned => match &self.detail {
                Some(detail) => format!(
                    "{} {} - {} ({})",
                    c,
                    self.name,
                    detail,
                    format_duration(self.duration)
                ),
                None => format!("{} {} ({})", c, self.name, format_duration(self.duration)),
            },
            StepStatus::Unchanged => match &self.detail {
                Some(detail) => format!("{} {} - {}", c, self.name, detail),
                None => format!("{} {} (unchanged)", c, self.name),
            },
            StepStatus::Failed => {
                let error = self.detail.as_deref().unwrap_or("unknown error");
                format!("{} {} - {}", c, self.name, error)
            }
            StepStatus::NotRun => format!("{} {} (not run)", c, self.name),
            StepStatus::Planned => format!("{} {}", c, self.name),
        }
    }
}

/// Human-friendly duration: `340ms`, `2.1s`, `3m 12s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{}s", secs, millis / 100)
    } else {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(StepStatus::NotRun.to_string(), "not run");
        assert_eq!(StepStatus::Unchanged.to_string(), "unchanged");
    }

    #[test]
    fn status_is_ok() {
        assert!(StepStatus::Completed.is_ok());
        assert!(StepStatus::Warned.is_ok());
        assert!(!StepStatus::Failed.is_ok());
        assert!(!StepStatus::NotRun.is_ok());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&StepStatus::NotRun).unwrap();
        assert_eq!(json, "\"not_run\"");
    }

    #[test]
    fn format_duration_ranges() {
        assert_eq!(format_duration(Duration::from_millis(340)), "340ms");
        assert_eq!(format_duration(Duration::from_millis(2150)), "2.1s");
        assert_eq!(format_duration(Duration::from_secs(192)), "3m 12s");
    }

    #[test]
    fn summary_for_failure_shows_error() {
        let result = StepResult::failure(
            "system-packages",
            Duration::from_millis(10),
            "Package manager failed".to_string(),
        );
        assert_eq!(
            result.format_summary(),
            "✗ system-packages - Package manager failed"
        );
    }

    #[test]
    fn summary_for_not_run() {
        assert_eq!(
            StepResult::not_run("dependencies").format_summary(),
            "⊘ dependencies (not run)"
        );
    }

    #[test]
    fn planned_joins_commands() {
        let result = StepResult::planned(
            "system-packages",
            &["apt-get update".to_string(), "apt-get install -y x".to_string()],
        );
        assert_eq!(
            result.detail.as_deref(),
            Some("apt-get update\napt-get install -y x")
        );
        assert!(StepResult::planned("verify-tools", &[]).detail.is_none());
    }
}
