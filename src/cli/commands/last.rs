//! Last command implementation.
//!
//! The `cps-provision last` command shows the last run record.

use crate::cli::args::LastArgs;
use crate::error::{ProvisionError, Result};
use crate::state::StateStore;
use crate::steps::format_duration;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandContext, CommandResult};

/// The last command implementation.
pub struct LastCommand {
    context: CommandContext,
    args: LastArgs,
}

impl LastCommand {
    /// Create a new last command.
    pub fn new(context: CommandContext, args: LastArgs) -> Self {
        Self { context, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &LastArgs {
        &self.args
    }
}

impl Command for LastCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let loaded = self.context.load_config()?;
        let store = StateStore::new(
            &self.context.project_root,
            &loaded.config.settings.state_dir,
        );

        let record = match store.load_last_run()? {
            Some(record) => record,
            None => {
                ui.message("No runs recorded for this project.");
                return Ok(CommandResult::success());
            }
        };

        if self.args.json {
            let json = serde_json::to_string_pretty(&record)
                .map_err(|e| ProvisionError::Other(e.into()))?;
            ui.message(&json);
            return Ok(CommandResult::success());
        }

        ui.show_header("Last run");
        ui.message(&format!(
            "  When:     {}",
            record.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        let duration = std::time::Duration::from_millis(record.duration_ms().max(0) as u64);
        ui.message(&format!("  Duration: {}", format_duration(duration)));
        if let Some(digest) = &record.manifest_sha256 {
            ui.message(&format!("  Manifest: sha256:{}", &digest[..digest.len().min(12)]));
        }
        ui.message("");

        for step in &record.steps {
            let line = match &step.detail {
                Some(detail) => format!(
                    "  {} {:<20} {}",
                    step.status.display_char(),
                    step.name,
                    detail.lines().next().unwrap_or_default()
                ),
                None => format!(
                    "  {} {:<20} {}",
                    step.status.display_char(),
                    step.name,
                    step.status
                ),
            };
            ui.message(&line);
        }
        ui.message("");

        if record.success {
            ui.success("Succeeded");
        } else {
            ui.error(&format!(
                "Failed at {} (exit code {})",
                record.failed_step.as_deref().unwrap_or("preflight"),
                record.exit_code
            ));
            if let Some(error) = &record.error {
                ui.message(&format!("  {}", error));
            }
        }

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::PipelineResult;
    use crate::state::RunRecordBuilder;
    use crate::steps::StepResult;
    use crate::ui::MockUI;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn command(temp: &TempDir, json: bool) -> LastCommand {
        LastCommand::new(
            CommandContext::new(temp.path().to_path_buf(), None),
            LastArgs { json },
        )
    }

    fn save_record(temp: &TempDir) {
        let record = RunRecordBuilder::start()
            .manifest_digest(Some("0123456789abcdef0123".to_string()))
            .finish(&PipelineResult {
                steps: vec![StepResult::failure(
                    "dependencies",
                    Duration::from_millis(900),
                    "Cannot satisfy requirement 'requests==99.0'".to_string(),
                )],
                failed_step: Some("dependencies".to_string()),
                error: Some(ProvisionError::DependencyResolutionError {
                    requirement: "requests==99.0".to_string(),
                    code: Some(1),
                    message: "no matching distribution".to_string(),
                }),
                duration: Duration::from_millis(900),
            });
        StateStore::new(temp.path(), Path::new(".provision"))
            .save_last_run(&record)
            .unwrap();
    }

    #[test]
    fn no_record_yet() {
        let temp = TempDir::new().unwrap();
        let mut ui = MockUI::new();
        let result = command(&temp, false).execute(&mut ui).unwrap();
        assert!(result.success);
        assert!(ui.has_message("No runs recorded"));
    }

    #[test]
    fn shows_failed_run() {
        let temp = TempDir::new().unwrap();
        save_record(&temp);
        let mut ui = MockUI::new();

        command(&temp, false).execute(&mut ui).unwrap();

        assert!(ui.has_message("sha256:0123456789ab"));
        assert!(ui.has_message("requests==99.0"));
        assert!(ui.has_error("Failed at dependencies (exit code 1)"));
    }

    #[test]
    fn json_output() {
        let temp = TempDir::new().unwrap();
        save_record(&temp);
        let mut ui = MockUI::new();

        command(&temp, true).execute(&mut ui).unwrap();

        let value: serde_json::Value = serde_json::from_str(&ui.messages()[0]).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["failed_step"], "dependencies");
    }
}
