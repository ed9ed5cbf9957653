//! Non-interactive UI for CI/headless environments.
//!
//! Plain text, no spinners, no colors. Status goes to stdout and problems
//! go to stderr so logs from CI runs stay readable.

use crate::steps::format_duration;

use super::{OutputMode, RunSummary, SpinnerHandle, UserInterface};

/// UI implementation for non-interactive mode.
pub struct NonInteractiveUI {
    mode: OutputMode,
}

impl NonInteractiveUI {
    /// Create a new non-interactive UI.
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }
}

impl UserInterface for NonInteractiveUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("✓ {}", msg);
        }
    }

    fn warning(&mut self, msg: &str) {
        eprintln!("⚠ {}", msg);
    }

    fn error(&mut self, msg: &str) {
        eprintln!("✗ {}", msg);
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() {
            println!("{}", message);
        }
        Box::new(NoopSpinner { mode: self.mode })
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            println!("\n{}\n", title);
        }
    }

    fn show_step(&mut self, index: usize, total: usize, name: &str, description: &str) {
        if self.mode.shows_status() {
            println!("[{}/{}] {} {}", index + 1, total, name, description);
        }
    }

    fn show_hint(&mut self, hint: &str) {
        if self.mode.shows_status() {
            println!("  {}", hint);
        }
    }

    fn show_run_summary(&mut self, summary: &RunSummary) {
        if self.mode.shows_status() {
            println!();
            println!("  ┌─ Summary ──────────────────────────");
            for step in &summary.step_results {
                let right_side = match (step.duration, step.detail.as_deref()) {
                    (Some(d), _) => format_duration(d),
                    (None, Some(detail)) if !summary.dry_run => detail.to_string(),
                    _ => step.status.to_string(),
                };
                println!(
                    "  │ {} {:<20} {}",
                    step.status.display_char(),
                    step.name,
                    right_side
                );
                if summary.dry_run {
                    for line in step.detail.iter().flat_map(|d| d.lines()) {
                        println!("  │     {}", line);
                    }
                }
            }
            println!("  ├────────────────────────────────────");
            println!(
                "  │ Total: {} · {} run · {} not run",
                format_duration(summary.total_duration),
                summary.steps_run(),
                summary.steps_not_run(),
            );
            println!("  └────────────────────────────────────");
        }

        if summary.success {
            self.success(&summary.closing_line());
        } else {
            self.error(&summary.closing_line());
        }
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Spinner that only prints the final line.
struct NoopSpinner {
    mode: OutputMode,
}

impl SpinnerHandle for NoopSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("✓ {}", msg);
        }
    }

    fn finish_error(&mut self, msg: &str) {
        eprintln!("✗ {}", msg);
    }
}
