use super::{CheckItem, Host, Step, StepOutcome};
use crate::error::{ProvisionError, Result};
use crate::shell::platform::{parse_system_path, resolve_tool_path};
use std::path::PathBuf;

/// Package that usually provides a tool, for the missing-tool hint.
fn providing_package(tool: &str) -> Option<&'static str> {
    match tool {
        "tesseract" => Some("tesseract-ocr"),
        "pdftoppm" | "pdftotext" | "pdfinfo" => Some("poppler-utils"),
        _ => None,
    }
}

/// Confirm required binaries resolve on PATH after installation.
#[derive(Debug, Clone)]
pub struct VerifyTools {
    tools: Vec<String>,
    search_path: Option<Vec<PathBuf>>,
}

impl VerifyTools {
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
            search_path: None,
        }
    }

    /// Search these directories instead of the process PATH.
    pub fn with_search_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_path = Some(dirs);
        self
    }

    fn resolve(&self, tool: &str) -> Option<PathBuf> {
        match &self.search_path {
            Some(dirs) => resolve_tool_path(tool, dirs),
            None => resolve_tool_path(tool, &parse_system_path()),
        }
    }

    fn hint(tool: &str) -> String {
        match providing_package(tool) {
            Some(package) => format!("it is provided by the '{}' system package", package),
            None => "install it or remove it from verify.tools".to_string(),
        }
    }
}

impl Step for VerifyTools {
    fn name(&self) -> &str {
        "verify-tools"
    }

    fn description(&self) -> String {
        format!("Verifying tools: {}", self.tools.join(", "))
    }

    fn plan(&self, _host: &Host<'_>) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn run(&self, _host: &mut Host<'_>) -> Result<StepOutcome> {
        if self.tools.is_empty() {
            return Ok(StepOutcome::unchanged("no tools to verify"));
        }

        for tool in &self.tools {
            match self.resolve(tool) {
                Some(path) => tracing::debug!("{} -> {}", tool, path.display()),
                None => {
                    return Err(ProvisionError::ToolMissing {
                        tool: tool.clone(),
                        hint: Self::hint(tool),
                    })
                }
            }
        }
        Ok(StepOutcome::unchanged(format!(
            "{} found on PATH",
            self.tools.join(", ")
        )))
    }

    fn check(&self, _host: &Host<'_>) -> Result<Vec<CheckItem>> {
        Ok(self
            .tools
            .iter()
            .map(|tool| match self.resolve(tool) {
                Some(path) => CheckItem::ok(tool.as_str(), Some(path.display().to_string())),
                None => CheckItem::missing(tool.as_str(), Some("not on PATH".to_string())),
            })
            .collect())
    }
}
