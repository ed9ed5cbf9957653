use super::{CheckItem, Host, Step, StepOutcome};
use crate::error::Result;
use std::collections::BTreeSet;

/// Install OS packages through the host package manager.
#[derive(Debug, Clone)]
pub struct InstallSystemPackages {
    packages: BTreeSet<String>,
}

impl InstallSystemPackages {
    pub fn new<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            packages: packages.into_iter().map(Into::into).collect(),
        }
    }

    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }
}

impl Step for InstallSystemPackages {
    fn name(&self) -> &str {
        "system-packages"
    }

    fn description(&self) -> String {
        if self.packages.is_empty() {
            "No system packages configured".to_string()
        } else {
            let names: Vec<&str> = self.packages.iter().map(String::as_str).collect();
            format!("Installing system packages: {}", names.join(", "))
        }
    }

    fn plan(&self, host: &Host<'_>) -> Result<Vec<String>> {
        Ok(host
            .system
            .install_commands(&self.packages)
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    fn run(&self, host: &mut Host<'_>) -> Result<StepOutcome> {
        if self.packages.is_empty() {
            return Ok(StepOutcome::unchanged("no packages configured"));
        }

        let report = host.system.ensure_installed(&self.packages)?;
        if report.is_unchanged() {
            tracing::debug!(
                "{} system packages already installed",
                report.already_present.len()
            );
            return Ok(StepOutcome::unchanged(format!(
                "{} already installed",
                report.already_present.join(", ")
            )));
        }

        Ok(StepOutcome::completed(format!(
            "installed {} via {}",
            report.installed.join(", "),
            host.system.name()
        )))
    }

    fn check(&self, host: &Host<'_>) -> Result<Vec<CheckItem>> {
        let mut items = Vec::new();
        for package in &self.packages {
            if host.system.is_installed(package)? {
                items.push(CheckItem::ok(package.as_str(), None));
            } else {
                items.push(CheckItem::missing(package.as_str(), Some("not installed".into())));
            }
        }
        Ok(items)
    }
}
