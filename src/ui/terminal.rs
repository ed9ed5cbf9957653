//! Interactive terminal UI.

use console::Term;
use std::io::Write;

use crate::steps::format_duration;

use super::{
    NonInteractiveUI, OutputMode, ProgressSpinner, ProvisionTheme, RunSummary, SpinnerHandle,
    UserInterface,
};

/// Interactive terminal UI implementation.
pub struct TerminalUI {
    term: Term,
    theme: ProvisionTheme,
    mode: OutputMode,
}

impl TerminalUI {
    /// Create a new terminal UI.
    pub fn new(mode: OutputMode, colors: bool) -> Self {
        let theme = if colors {
            ProvisionTheme::new()
        } else {
            ProvisionTheme::plain()
        };

        Self {
            term: Term::stdout(),
            theme,
            mode,
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        writeln!(Term::stderr(), "{}", self.theme.format_warning(msg)).ok();
    }

    fn error(&mut self, msg: &str) {
        writeln!(Term::stderr(), "{}", self.theme.format_error(msg)).ok();
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() {
            Box::new(ProgressSpinner::new(message, self.theme.clone()))
        } else {
            Box::new(ProgressSpinner::hidden())
        }
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn show_step(&mut self, index: usize, total: usize, name: &str, description: &str) {
        if self.mode.shows_status() {
            writeln!(
                self.term,
                "{} {} {}",
                self.theme.dim.apply_to(format!("[{}/{}]", index + 1, total)),
                self.theme.highlight.apply_to(name),
                self.theme.dim.apply_to(description)
            )
            .ok();
        }
    }

    fn show_hint(&mut self, hint: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "  {}", self.theme.hint.apply_to(hint)).ok();
        }
    }

    fn show_run_summary(&mut self, summary: &RunSummary) {
        if self.mode.shows_status() {
            let b = &self.theme.border;
            writeln!(self.term).ok();
            writeln!(
                self.term,
                "  {} {}",
                b.apply_to("┌─"),
                b.apply_to("Summary ──────────────────────────")
            )
            .ok();

            for step in &summary.step_results {
                let right_side = match (step.duration, step.detail.as_deref()) {
                    (Some(d), _) => self.theme.duration.apply_to(format_duration(d)).to_string(),
                    (None, Some(detail)) if !summary.dry_run => {
                        self.theme.dim.apply_to(detail).to_string()
                    }
                    _ => self.theme.dim.apply_to(step.status).to_string(),
                };
                writeln!(
                    self.term,
                    "  {} {} {:<20} {}",
                    b.apply_to("│"),
                    self.theme.status_icon(step.status),
                    step.name,
                    right_side
                )
                .ok();

                if summary.dry_run {
                    for line in step.detail.iter().flat_map(|d| d.lines()) {
                        writeln!(
                            self.term,
                            "  {}     {}",
                            b.apply_to("│"),
                            self.theme.dim.apply_to(line)
                        )
                        .ok();
                    }
                }
            }

            writeln!(
                self.term,
                "  {}",
                b.apply_to("├────────────────────────────────────")
            )
            .ok();
            writeln!(
                self.term,
                "  {} Total: {} {} {} run {} {} not run",
                b.apply_to("│"),
                self.theme
                    .duration
                    .apply_to(format_duration(summary.total_duration)),
                self.theme.dim.apply_to("·"),
                summary.steps_run(),
                self.theme.dim.apply_to("·"),
                summary.steps_not_run(),
            )
            .ok();
            writeln!(
                self.term,
                "  {}",
                b.apply_to("└────────────────────────────────────")
            )
            .ok();
        }

        if summary.success {
            self.success(&summary.closing_line());
        } else {
            self.error(&summary.closing_line());
        }
    }

    fn is_interactive(&self) -> bool {
        self.term.is_term()
    }
}

/// Create the appropriate UI based on context.
pub fn create_ui(colors: bool, mode: OutputMode) -> Box<dyn UserInterface> {
    if Term::stdout().is_term() && !crate::shell::is_ci() {
        Box::new(TerminalUI::new(mode, colors))
    } else {
        Box::new(NonInteractiveUI::new(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_ui_output_mode() {
        let ui = TerminalUI::new(OutputMode::Quiet, false);
        assert_eq!(ui.output_mode(), OutputMode::Quiet);
    }

    #[test]
    fn create_ui_respects_mode() {
        let ui = create_ui(false, OutputMode::Verbose);
        assert_eq!(ui.output_mode(), OutputMode::Verbose);
    }
}
