//! pip, driven through `<python> -m pip`.

use super::{unsatisfied, DependencyInstaller, InstallReport};
use crate::error::{ProvisionError, Result};
use crate::manifest::{normalize_name, Manifest, Version};
use crate::runner::patterns::{failing_requirement, last_line};
use crate::shell::{
    discard_output, echo_output, execute, execute_streaming, CommandOptions, CommandSpec,
};
use anyhow::Context;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Deserialize)]
struct PipListEntry {
    name: String,
    version: String,
}

/// Parse `pip list --format=json` output into normalized name -> version.
///
/// Entries whose version isn't PEP 440 (old legacy versions) are skipped.
pub fn parse_pip_list(json: &str) -> anyhow::Result<BTreeMap<String, Version>> {
    let entries: Vec<PipListEntry> =
        serde_json::from_str(json.trim()).context("parsing `pip list --format=json` output")?;

    let mut installed = BTreeMap::new();
    for entry in entries {
        match entry.version.parse::<Version>() {
            Ok(version) => {
                installed.insert(normalize_name(&entry.name), version);
            }
            Err(e) => tracing::debug!("skipping {} {}: {}", entry.name, entry.version, e),
        }
    }
    Ok(installed)
}

/// Extract the version from `pip --version` (`pip 24.0 from ... (python 3.12)`).
pub fn parse_pip_version(output: &str) -> Option<Version> {
    let mut words = output.split_whitespace();
    match words.next() {
        Some("pip") => words.next()?.parse().ok(),
        _ => None,
    }
}

/// [`DependencyInstaller`] backed by pip.
#[derive(Debug, Clone)]
pub struct PipInstaller {
    python: String,
    echo: bool,
}

impl PipInstaller {
    /// Run pip through the given interpreter.
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            echo: true,
        }
    }

    /// Stream (or swallow) pip's output while it runs.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn pip<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(self.python.clone(), ["-m", "pip"]).args(args)
    }

    fn options() -> CommandOptions {
        let mut env = HashMap::new();
        env.insert("PIP_DISABLE_PIP_VERSION_CHECK".to_string(), "1".to_string());
        CommandOptions {
            env,
            capture_stdout: true,
            capture_stderr: true,
            ..Default::default()
        }
    }

    fn stream(&self, spec: &CommandSpec) -> Result<crate::shell::CommandResult> {
        let callback = if self.echo {
            echo_output()
        } else {
            discard_output()
        };
        execute_streaming(spec, &Self::options(), callback)
    }
}

impl DependencyInstaller for PipInstaller {
    fn name(&self) -> &str {
        "pip"
    }

    fn version(&self) -> Result<Option<Version>> {
        match execute(&self.pip(["--version"]), &Self::options()) {
            Ok(result) if result.success => Ok(parse_pip_version(&result.stdout)),
            Ok(result) => {
                tracing::debug!("pip --version exited with {:?}", result.exit_code);
                Ok(None)
            }
            Err(e) => {
                tracing::debug!("could not run pip --version: {}", e);
                Ok(None)
            }
        }
    }

    fn upgrade_self(&mut self) -> Result<()> {
        let spec = self.upgrade_command();
        let result = self.stream(&spec).map_err(|e| ProvisionError::UpgradeError {
            installer: "pip".to_string(),
            code: None,
            message: e.to_string(),
        })?;
        if result.success {
            return Ok(());
        }
        Err(ProvisionError::UpgradeError {
            installer: "pip".to_string(),
            code: result.exit_code,
            message: last_line(&result.combined_output()),
        })
    }

    fn installed(&self) -> Result<BTreeMap<String, Version>> {
        let spec = self.pip(["list", "--format=json"]);
        let result = execute(&spec, &Self::options())?;
        if !result.success {
            return Err(anyhow::anyhow!(
                "`{}` failed: {}",
                spec,
                last_line(&result.combined_output())
            )
            .into());
        }
        Ok(parse_pip_list(&result.stdout)?)
    }

    fn install(&mut self, manifest: &Manifest) -> Result<InstallReport> {
        let before = self.installed()?;
        let spec = self.install_command(manifest);
        let result = self.stream(&spec)?;

        if !result.success {
            let output = result.combined_output();
            let requirement = failing_requirement(&output)
                .or_else(|| {
                    unsatisfied(manifest, &before)
                        .first()
                        .map(|r| r.as_str().to_string())
                })
                .unwrap_or_else(|| manifest.path().display().to_string());
            return Err(ProvisionError::DependencyResolutionError {
                requirement,
                code: result.exit_code,
                message: last_line(&output),
            });
        }

        let after = self.installed()?;
        let mut report = InstallReport::default();
        for req in manifest.entries() {
            let key = req.key();
            match (before.get(&key), after.get(&key)) {
                (Some(old), Some(new)) if old == new => report.already_present.push(key),
                (_, Some(new)) => report.installed.push(format!("{}=={}", key, new)),
                (_, None) => report.already_present.push(key),
            }
        }
        Ok(report)
    }

    fn upgrade_command(&self) -> CommandSpec {
        self.pip(["install", "--upgrade", "pip"])
    }

    fn install_command(&self, manifest: &Manifest) -> CommandSpec {
        self.pip(["install", "-r"])
            .arg(manifest.path().display().to_string())
    }
}
