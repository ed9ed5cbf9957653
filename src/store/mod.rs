//! Package stores: the host package manager and the language installer.
//!
//! Steps never shell out directly. They talk to a [`PackageStore`] for OS
//! packages and a [`DependencyInstaller`] for manifest dependencies, so the
//! whole pipeline can run against the in-memory fakes in [`memory`].

pub mod memory;
pub mod pip;
pub mod system;

pub use memory::{EventLog, InMemoryInstaller, InMemoryPackageStore};
pub use pip::{parse_pip_list, PipInstaller};
pub use system::{SystemPackageManager, SystemStore};

use crate::error::Result;
use crate::manifest::{HostPlatform, Manifest, Requirement, Version};
use crate::shell::CommandSpec;
use std::collections::{BTreeMap, BTreeSet};

/// What an install call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Packages newly installed (or changed) by this call.
    pub installed: Vec<String>,
    /// Packages that were already in place.
    pub already_present: Vec<String>,
}

impl InstallReport {
    /// Whether nothing was installed.
    pub fn is_unchanged(&self) -> bool {
        self.installed.is_empty()
    }
}

/// OS-level package store.
pub trait PackageStore {
    /// Display name (`apt`, `dnf`, ...).
    fn name(&self) -> &str;

    /// Whether a package is currently installed.
    fn is_installed(&self, package: &str) -> Result<bool>;

    /// Install every missing package in one transaction. Does nothing when
    /// all packages are already present.
    fn ensure_installed(&mut self, packages: &BTreeSet<String>) -> Result<InstallReport>;

    /// Commands `ensure_installed` would run for these packages.
    fn install_commands(&self, packages: &BTreeSet<String>) -> Vec<CommandSpec>;
}

/// Language-level dependency installer.
pub trait DependencyInstaller {
    /// Display name (`pip`).
    fn name(&self) -> &str;

    /// Installed installer version, `None` when it can't be determined.
    fn version(&self) -> Result<Option<Version>>;

    /// Upgrade the installer itself.
    fn upgrade_self(&mut self) -> Result<()>;

    /// Installed packages by normalized name.
    fn installed(&self) -> Result<BTreeMap<String, Version>>;

    /// Install every manifest entry. Never removes anything.
    fn install(&mut self, manifest: &Manifest) -> Result<InstallReport>;

    /// Command `upgrade_self` runs.
    fn upgrade_command(&self) -> CommandSpec;

    /// Command `install` runs.
    fn install_command(&self, manifest: &Manifest) -> CommandSpec;
}

/// Split packages into (missing, present) using `store.is_installed`.
pub fn partition_installed(
    store: &dyn PackageStore,
    packages: &BTreeSet<String>,
) -> Result<(Vec<String>, Vec<String>)> {
    let mut missing = Vec::new();
    let mut present = Vec::new();
    for package in packages {
        if store.is_installed(package)? {
            present.push(package.clone());
        } else {
            missing.push(package.clone());
        }
    }
    Ok((missing, present))
}

/// How one manifest entry stands against the installed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    /// Installed at a version the specifiers accept.
    Satisfied(Version),
    /// Installed, but at a version the specifiers reject.
    Outdated(Version),
    /// Applies to this host and isn't installed.
    Missing,
    /// Its marker excludes this host.
    Excluded,
    /// Not installed, and its marker can only be evaluated by the installer.
    Undecided,
}

impl EntryState {
    /// Whether the entry still needs the installer to act.
    pub fn is_gap(&self) -> bool {
        matches!(self, EntryState::Outdated(_) | EntryState::Missing)
    }
}

/// Classify `req` against `installed` on `host`.
pub fn entry_state(
    req: &Requirement,
    installed: &BTreeMap<String, Version>,
    host: &HostPlatform,
) -> EntryState {
    let applies = req.applies_to(host);
    if applies == Some(false) {
        return EntryState::Excluded;
    }
    match installed.get(&req.key()) {
        Some(version) if req.is_satisfied_by(version) => EntryState::Satisfied(version.clone()),
        Some(version) => EntryState::Outdated(version.clone()),
        None if applies.is_none() => EntryState::Undecided,
        None => EntryState::Missing,
    }
}

/// Manifest entries not satisfied by the installed set, in manifest order.
///
/// Entries whose marker excludes this host, or can't be evaluated here and
/// aren't installed, are not counted.
pub fn unsatisfied<'m>(
    manifest: &'m Manifest,
    installed: &BTreeMap<String, Version>,
) -> Vec<&'m Requirement> {
    unsatisfied_on(manifest, installed, &HostPlatform::current())
}

/// [`unsatisfied`] for an explicit host platform.
pub fn unsatisfied_on<'m>(
    manifest: &'m Manifest,
    installed: &BTreeMap<String, Version>,
    host: &HostPlatform,
) -> Vec<&'m Requirement> {
    manifest
        .entries()
        .iter()
        .filter(|req| entry_state(req, installed, host).is_gap())
        .collect()
}

/// Whether the installer has to run for this manifest.
pub fn needs_install(manifest: &Manifest, installed: &BTreeMap<String, Version>) -> bool {
    (manifest.needs_installer() && !manifest.is_empty())
        || !unsatisfied(manifest, installed).is_empty()
}
