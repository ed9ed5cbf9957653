//! Host package managers.

use super::{partition_installed, InstallReport, PackageStore};
use crate::config::{ManagerKind, SudoPolicy, SystemConfig};
use crate::error::{ProvisionError, Result};
use crate::runner::patterns::{classify_after_refresh, last_line, reports_network_failure};
use crate::shell::{
    discard_output, echo_output, execute_quiet, execute_streaming, find_on_path, is_elevated,
    CommandOptions, CommandSpec,
};
use std::collections::{BTreeSet, HashMap};

/// Supported host package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemPackageManager {
    Apt,
    Dnf,
    Yum,
    Apk,
    Pacman,
    Brew,
}

impl SystemPackageManager {
    /// Order in which `auto` probes PATH.
    pub const DETECTION_ORDER: [SystemPackageManager; 6] = [
        SystemPackageManager::Apt,
        SystemPackageManager::Dnf,
        SystemPackageManager::Yum,
        SystemPackageManager::Apk,
        SystemPackageManager::Pacman,
        SystemPackageManager::Brew,
    ];

    /// The manager named in config, `None` for `auto`.
    pub fn from_kind(kind: ManagerKind) -> Option<Self> {
        match kind {
            ManagerKind::Auto => None,
            ManagerKind::Apt => Some(Self::Apt),
            ManagerKind::Dnf => Some(Self::Dnf),
            ManagerKind::Yum => Some(Self::Yum),
            ManagerKind::Apk => Some(Self::Apk),
            ManagerKind::Pacman => Some(Self::Pacman),
            ManagerKind::Brew => Some(Self::Brew),
        }
    }

    /// First manager whose binary is on PATH.
    pub fn detect() -> Option<Self> {
        Self::DETECTION_ORDER
            .into_iter()
            .find(|m| find_on_path(m.program()).is_some())
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Yum => "yum",
            Self::Apk => "apk",
            Self::Pacman => "pacman",
            Self::Brew => "brew",
        }
    }

    /// Binary that performs installs.
    pub fn program(&self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Yum => "yum",
            Self::Apk => "apk",
            Self::Pacman => "pacman",
            Self::Brew => "brew",
        }
    }

    /// Whether installs need root.
    pub fn needs_root(&self) -> bool {
        !matches!(self, Self::Brew)
    }

    /// Read-only presence query for one package.
    pub fn query_command(&self, package: &str) -> CommandSpec {
        match self {
            Self::Apt => CommandSpec::new("dpkg-query", ["-W", "-f=${Status}", package]),
            Self::Dnf | Self::Yum => CommandSpec::new("rpm", ["-q", package]),
            Self::Apk => CommandSpec::new("apk", ["info", "-e", package]),
            Self::Pacman => CommandSpec::new("pacman", ["-Q", package]),
            Self::Brew => CommandSpec::new("brew", ["list", "--versions", package]),
        }
    }

    /// Index refresh run before installing, when the manager has one.
    pub fn refresh_command(&self) -> Option<CommandSpec> {
        match self {
            Self::Apt => Some(CommandSpec::new("apt-get", ["update"])),
            _ => None,
        }
    }

    /// Single-transaction install of all packages.
    pub fn install_command<I, S>(&self, packages: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base = match self {
            Self::Apt => CommandSpec::new("apt-get", ["install", "-y", "--no-install-recommends"]),
            Self::Dnf => CommandSpec::new("dnf", ["install", "-y"]),
            Self::Yum => CommandSpec::new("yum", ["install", "-y"]),
            Self::Apk => CommandSpec::new("apk", ["add", "--no-cache"]),
            Self::Pacman => CommandSpec::new("pacman", ["-S", "--noconfirm", "--needed"]),
            Self::Brew => CommandSpec::new("brew", ["install"]),
        };
        base.args(packages)
    }

    /// Interpret the output of a successful query command.
    fn query_says_installed(&self, stdout: &str) -> bool {
        match self {
            Self::Apt => stdout.contains("install ok installed"),
            Self::Brew => !stdout.trim().is_empty(),
            _ => true,
        }
    }

    fn environment(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        match self {
            Self::Apt => {
                env.insert("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string());
            }
            Self::Brew => {
                env.insert("HOMEBREW_NO_AUTO_UPDATE".to_string(), "1".to_string());
            }
            _ => {}
        }
        env
    }
}

/// Decide whether to prefix manager commands with `sudo`.
pub fn resolve_sudo(policy: SudoPolicy, manager: SystemPackageManager) -> bool {
    match policy {
        SudoPolicy::Never => false,
        SudoPolicy::Always => true,
        SudoPolicy::Auto => {
            manager.needs_root() && !is_elevated() && find_on_path("sudo").is_some()
        }
    }
}

/// [`PackageStore`] backed by the host package manager.
#[derive(Debug)]
pub struct SystemStore {
    manager: SystemPackageManager,
    use_sudo: bool,
    refresh_index: bool,
    refreshed: bool,
    index_unreachable: bool,
    echo: bool,
}

impl SystemStore {
    /// Create a store for a specific manager.
    pub fn new(manager: SystemPackageManager, use_sudo: bool, refresh_index: bool) -> Self {
        Self {
            manager,
            use_sudo,
            refresh_index,
            refreshed: false,
            index_unreachable: false,
            echo: true,
        }
    }

    /// Build a store from configuration, detecting the manager for `auto`.
    pub fn from_config(config: &SystemConfig) -> Result<Self> {
        let manager = match SystemPackageManager::from_kind(config.manager) {
            Some(manager) => manager,
            None => SystemPackageManager::detect().ok_or_else(|| {
                ProvisionError::PackageManagerUnavailable {
                    message: "none of apt-get, dnf, yum, apk, pacman, brew found on PATH"
                        .to_string(),
                }
            })?,
        };
        let use_sudo = resolve_sudo(config.use_sudo, manager);
        tracing::debug!(
            "using {} (sudo: {}, refresh index: {})",
            manager.name(),
            use_sudo,
            config.refresh_index
        );
        Ok(Self::new(manager, use_sudo, config.refresh_index))
    }

    /// Stream (or swallow) native manager output while it runs.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// The manager in use.
    pub fn manager(&self) -> SystemPackageManager {
        self.manager
    }

    fn privileged(&self, spec: CommandSpec) -> CommandSpec {
        if self.use_sudo {
            spec.with_sudo()
        } else {
            spec
        }
    }

    fn ensure_available(&self) -> Result<()> {
        if find_on_path(self.manager.program()).is_none() {
            return Err(ProvisionError::PackageManagerUnavailable {
                message: format!("{} not found on PATH", self.manager.program()),
            });
        }
        Ok(())
    }

    fn run_transaction(&self, spec: &CommandSpec, packages: &[String]) -> Result<String> {
        let options = CommandOptions {
            env: self.manager.environment(),
            ..Default::default()
        };
        let callback = if self.echo {
            echo_output()
        } else {
            discard_output()
        };

        let result = execute_streaming(spec, &options, callback)?;
        let output = result.combined_output();
        if result.success {
            return Ok(output);
        }

        let kind = classify_after_refresh(&output, self.index_unreachable);
        tracing::debug!("`{}` failed ({}), exit code {:?}", spec, kind, result.exit_code);
        Err(ProvisionError::PackageManagerError {
            packages: packages.to_vec(),
            kind,
            code: result.exit_code,
            message: last_line(&output),
        })
    }
}

impl PackageStore for SystemStore {
    fn name(&self) -> &str {
        self.manager.name()
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        self.ensure_available()?;
        let result = execute_quiet(&self.manager.query_command(package))?;
        let installed = result.success && self.manager.query_says_installed(&result.stdout);
        tracing::debug!("{} installed: {}", package, installed);
        Ok(installed)
    }

    fn ensure_installed(&mut self, packages: &BTreeSet<String>) -> Result<InstallReport> {
        if packages.is_empty() {
            return Ok(InstallReport::default());
        }
        let (missing, present) = partition_installed(&*self, packages)?;
        if missing.is_empty() {
            return Ok(InstallReport {
                installed: Vec::new(),
                already_present: present,
            });
        }

        if self.refresh_index && !self.refreshed {
            if let Some(refresh) = self.manager.refresh_command() {
                let output = self.run_transaction(&self.privileged(refresh), &missing)?;
                self.index_unreachable = reports_network_failure(&output);
                if self.index_unreachable {
                    tracing::warn!("package index refresh could not reach every mirror");
                }
                self.refreshed = true;
            }
        }

        let install = self.privileged(self.manager.install_command(missing.iter().cloned()));
        self.run_transaction(&install, &missing)?;

        Ok(InstallReport {
            installed: missing,
            already_present: present,
        })
    }

    fn install_commands(&self, packages: &BTreeSet<String>) -> Vec<CommandSpec> {
        let mut commands = Vec::new();
        if packages.is_empty() {
            return commands;
        }
        if self.refresh_index {
            if let Some(refresh) = self.manager.refresh_command() {
                commands.push(self.privileged(refresh));
            }
        }
        commands.push(self.privileged(self.manager.install_command(packages.iter().cloned())));
        commands
    }
}
