//! A `UserInterface` that records what would have been shown.
//!
//! ```
//! use cps_provision::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.show_header("Provisioning");
//! ui.success("Host provisioned");
//!
//! assert!(ui.has_success("provisioned"));
//! assert_eq!(ui.shown().len(), 2);
//! ```

use std::sync::{Arc, Mutex};

use super::{OutputMode, RunSummary, SpinnerHandle, UserInterface};

/// One thing the interface was asked to display.
#[derive(Debug, Clone)]
pub enum Shown {
    Message(String),
    Success(String),
    Warning(String),
    Error(String),
    Header(String),
    Hint(String),
    Step {
        index: usize,
        total: usize,
        name: String,
    },
    Spinner(String),
    Summary(RunSummary),
}

/// Records output in display order instead of writing it anywhere.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    shown: Vec<Shown>,
    spinner_results: Arc<Mutex<Vec<(bool, String)>>>,
}

impl MockUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Everything displayed so far, oldest first.
    pub fn shown(&self) -> &[Shown] {
        &self.shown
    }

    /// Plain messages, in order.
    pub fn messages(&self) -> Vec<&str> {
        self.shown
            .iter()
            .filter_map(|s| match s {
                Shown::Message(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Announced steps as (index, total, name).
    pub fn steps(&self) -> Vec<(usize, usize, &str)> {
        self.shown
            .iter()
            .filter_map(|s| match s {
                Shown::Step { index, total, name } => Some((*index, *total, name.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn summaries(&self) -> Vec<&RunSummary> {
        self.shown
            .iter()
            .filter_map(|s| match s {
                Shown::Summary(summary) => Some(summary),
                _ => None,
            })
            .collect()
    }

    /// How spinners finished, as (succeeded, message).
    pub fn spinner_results(&self) -> Vec<(bool, String)> {
        self.spinner_results
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn has_message(&self, needle: &str) -> bool {
        self.any(|s| matches!(s, Shown::Message(m) if m.contains(needle)))
    }

    pub fn has_success(&self, needle: &str) -> bool {
        self.any(|s| matches!(s, Shown::Success(m) if m.contains(needle)))
    }

    pub fn has_warning(&self, needle: &str) -> bool {
        self.any(|s| matches!(s, Shown::Warning(m) if m.contains(needle)))
    }

    pub fn has_error(&self, needle: &str) -> bool {
        self.any(|s| matches!(s, Shown::Error(m) if m.contains(needle)))
    }

    pub fn has_hint(&self, needle: &str) -> bool {
        self.any(|s| matches!(s, Shown::Hint(m) if m.contains(needle)))
    }

    fn any(&self, pred: impl Fn(&Shown) -> bool) -> bool {
        self.shown.iter().any(pred)
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.shown.push(Shown::Message(msg.to_string()));
    }

    fn success(&mut self, msg: &str) {
        self.shown.push(Shown::Success(msg.to_string()));
    }

    fn warning(&mut self, msg: &str) {
        self.shown.push(Shown::Warning(msg.to_string()));
    }

    fn error(&mut self, msg: &str) {
        self.shown.push(Shown::Error(msg.to_string()));
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        self.shown.push(Shown::Spinner(message.to_string()));
        Box::new(MockSpinner {
            results: Arc::clone(&self.spinner_results),
        })
    }

    fn show_header(&mut self, title: &str) {
        self.shown.push(Shown::Header(title.to_string()));
    }

    fn show_step(&mut self, index: usize, total: usize, name: &str, _description: &str) {
        self.shown.push(Shown::Step {
            index,
            total,
            name: name.to_string(),
        });
    }

    fn show_hint(&mut self, hint: &str) {
        self.shown.push(Shown::Hint(hint.to_string()));
    }

    fn show_run_summary(&mut self, summary: &RunSummary) {
        self.shown.push(Shown::Summary(summary.clone()));
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Spinner that records how it finished.
pub struct MockSpinner {
    results: Arc<Mutex<Vec<(bool, String)>>>,
}

impl SpinnerHandle for MockSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        if let Ok(mut results) = self.results.lock() {
            results.push((true, msg.to_string()));
        }
    }

    fn finish_error(&mut self, msg: &str) {
        if let Ok(mut results) = self.results.lock() {
            results.push((false, msg.to_string()));
        }
    }
}
