//! Visual theme and styling.

use console::Style;

use crate::steps::StepStatus;

/// Styles used for terminal output.
#[derive(Debug, Clone)]
pub struct ProvisionTheme {
    /// Style for success messages (green).
    pub success: Style,
    /// Style for warning messages (orange).
    pub warning: Style,
    /// Style for error messages (red bold).
    pub error: Style,
    /// Style for dim/secondary text.
    pub dim: Style,
    /// Style for highlighted/important text (bold).
    pub highlight: Style,
    /// Style for headers (cyan bold).
    pub header: Style,
    /// Style for durations (dim).
    pub duration: Style,
    /// Style for box-drawing borders (dim).
    pub border: Style,
    /// Style for contextual hints (cyan dim).
    pub hint: Style,
}

impl Default for ProvisionTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisionTheme {
    /// The colored theme.
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
            header: Style::new().bold().cyan(),
            duration: Style::new().dim(),
            border: Style::new().dim(),
            hint: Style::new().cyan().dim(),
        }
    }

    /// Create a theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
            header: Style::new(),
            duration: Style::new(),
            border: Style::new(),
            hint: Style::new(),
        }
    }

    /// Format a success message (icon + text in green).
    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    /// Format a warning message (icon + text in orange).
    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    /// Format an error message (icon + text in red bold).
    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    /// Format a header banner.
    pub fn format_header(&self, title: &str) -> String {
        format!("{}", self.header.apply_to(format!("▸ {}", title)))
    }

    /// The status icon in the status's color.
    pub fn status_icon(&self, status: StepStatus) -> String {
        let style = match status {
            StepStatus::Completed | StepStatus::Unchanged => &self.success,
            StepStatus::Warned => &self.warning,
            StepStatus::Failed => &self.error,
            StepStatus::NotRun | StepStatus::Planned => &self.dim,
        };
        style.apply_to(status.display_char()).to_string()
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    console::Term::stdout().is_term()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_formats_messages() {
        let theme = ProvisionTheme::plain();
        assert_eq!(theme.format_success("done"), "✓ done");
        assert_eq!(theme.format_warning("careful"), "⚠ careful");
        assert_eq!(theme.format_error("failed"), "✗ failed");
        assert!(theme.format_header("cps-provision").contains("cps-provision"));
    }

    #[test]
    fn plain_status_icons() {
        let theme = ProvisionTheme::plain();
        assert_eq!(theme.status_icon(StepStatus::Completed), "✓");
        assert_eq!(theme.status_icon(StepStatus::Failed), "✗");
        assert_eq!(theme.status_icon(StepStatus::NotRun), "⊘");
    }

    #[test]
    fn default_matches_new() {
        assert_eq!(
            ProvisionTheme::default().format_success("x"),
            ProvisionTheme::new().format_success("x")
        );
    }
}
