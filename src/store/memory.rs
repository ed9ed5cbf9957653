//! In-memory package stores for tests.
//!
//! [`InMemoryPackageStore`] models a package universe, an installed set, an
//! offline network and a held lock. [`InMemoryInstaller`] models a package
//! index with versions, an installed set and a failing self-upgrade. Both
//! append every mutating call to an optional shared [`EventLog`], so a test
//! can assert the order in which the pipeline touched them.

use super::{partition_installed, DependencyInstaller, InstallReport, PackageStore};
use crate::error::{PackageFailure, ProvisionError, Result};
use crate::manifest::{normalize_name, HostPlatform, Manifest, Version};
use crate::shell::CommandSpec;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

/// Shared, ordered record of mutating calls.
pub type EventLog = Arc<Mutex<Vec<String>>>;

fn record(events: &Option<EventLog>, event: String) {
    if let Some(log) = events {
        if let Ok(mut log) = log.lock() {
            log.push(event);
        }
    }
}

/// Fake host package manager.
#[derive(Debug, Default)]
pub struct InMemoryPackageStore {
    universe: BTreeSet<String>,
    installed: BTreeSet<String>,
    offline: bool,
    locked: bool,
    events: Option<EventLog>,
    transactions: usize,
}

impl InMemoryPackageStore {
    /// An empty store: nothing available, nothing installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make packages installable.
    pub fn with_available<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.universe.extend(packages.into_iter().map(Into::into));
        self
    }

    /// Mark packages as already installed.
    pub fn with_installed<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for package in packages {
            let package = package.into();
            self.universe.insert(package.clone());
            self.installed.insert(package);
        }
        self
    }

    /// Fail every transaction with a network error.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Fail every transaction with a held lock.
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Record transactions into a shared log.
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Currently installed packages.
    pub fn installed(&self) -> &BTreeSet<String> {
        &self.installed
    }

    /// Number of manager invocations so far.
    pub fn transactions(&self) -> usize {
        self.transactions
    }

    fn failure(packages: &[String], kind: PackageFailure) -> ProvisionError {
        ProvisionError::PackageManagerError {
            packages: packages.to_vec(),
            message: kind.to_string(),
            kind,
            code: Some(100),
        }
    }
}

impl PackageStore for InMemoryPackageStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        Ok(self.installed.contains(package))
    }

    fn ensure_installed(&mut self, packages: &BTreeSet<String>) -> Result<InstallReport> {
        let (missing, present) = partition_installed(&*self, packages)?;
        if missing.is_empty() {
            return Ok(InstallReport {
                installed: Vec::new(),
                already_present: present,
            });
        }

        self.transactions += 1;
        record(&self.events, format!("system:install {}", missing.join(" ")));

        if self.locked {
            return Err(Self::failure(&missing, PackageFailure::LockUnavailable));
        }
        if self.offline {
            return Err(Self::failure(&missing, PackageFailure::Network));
        }
        if let Some(unknown) = missing.iter().find(|p| !self.universe.contains(*p)) {
            let kind = PackageFailure::UnknownPackage {
                name: unknown.clone(),
            };
            return Err(Self::failure(&missing, kind));
        }

        self.installed.extend(missing.iter().cloned());
        Ok(InstallReport {
            installed: missing,
            already_present: present,
        })
    }

    fn install_commands(&self, packages: &BTreeSet<String>) -> Vec<CommandSpec> {
        if packages.is_empty() {
            return Vec::new();
        }
        vec![CommandSpec::new("memory-pm", ["install"]).args(packages.iter().cloned())]
    }
}

/// Fake language package installer backed by an in-memory index.
#[derive(Debug)]
pub struct InMemoryInstaller {
    index: BTreeMap<String, Vec<Version>>,
    installed: BTreeMap<String, Version>,
    version: Option<Version>,
    upgrade_to: Option<Version>,
    offline: bool,
    upgrade_fails: bool,
    version_query_fails: bool,
    events: Option<EventLog>,
    install_calls: usize,
    upgrade_calls: usize,
}

impl Default for InMemoryInstaller {
    fn default() -> Self {
        Self {
            index: BTreeMap::new(),
            installed: BTreeMap::new(),
            version: "23.0.1".parse().ok(),
            upgrade_to: "24.0".parse().ok(),
            offline: false,
            upgrade_fails: false,
            version_query_fails: false,
            events: None,
            install_calls: 0,
            upgrade_calls: 0,
        }
    }
}

fn parse_version(version: &str) -> Option<Version> {
    match version.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("ignoring fixture version {:?}: {}", version, e);
            None
        }
    }
}

impl InMemoryInstaller {
    /// An installer with an empty index and pip 23.0.1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish versions of a package to the index.
    pub fn with_package(mut self, name: &str, versions: &[&str]) -> Self {
        self.index
            .entry(normalize_name(name))
            .or_default()
            .extend(versions.iter().filter_map(|v| parse_version(v)));
        self
    }

    /// Mark a package version as installed (and published).
    pub fn with_installed(mut self, name: &str, version: &str) -> Self {
        let key = normalize_name(name);
        if let Some(version) = parse_version(version) {
            self.index.entry(key.clone()).or_default().push(version.clone());
            self.installed.insert(key, version);
        }
        self
    }

    /// Set the installer's own version (`None` = undetectable).
    pub fn with_version(mut self, version: Option<&str>) -> Self {
        self.version = version.and_then(parse_version);
        self
    }

    /// Fail installs and upgrades as if the index were unreachable.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Fail `upgrade_self` only.
    pub fn failing_upgrade(mut self) -> Self {
        self.upgrade_fails = true;
        self
    }

    /// Fail `version` as if `pip --version` couldn't be spawned.
    pub fn failing_version_query(mut self) -> Self {
        self.version_query_fails = true;
        self
    }

    /// Record calls into a shared log.
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Installed version of a package.
    pub fn installed_version(&self, name: &str) -> Option<&Version> {
        self.installed.get(&normalize_name(name))
    }

    /// Number of `install` calls so far.
    pub fn install_calls(&self) -> usize {
        self.install_calls
    }

    /// Number of `upgrade_self` calls so far.
    pub fn upgrade_calls(&self) -> usize {
        self.upgrade_calls
    }

    fn resolve(&self, manifest: &Manifest) -> Result<Vec<(String, Version)>> {
        let host = HostPlatform::current();
        let mut resolved = Vec::new();
        for req in manifest.entries() {
            if req.applies_to(&host) == Some(false) {
                continue;
            }
            let key = req.key();
            if let Some(current) = self.installed.get(&key) {
                if req.is_satisfied_by(current) {
                    continue;
                }
            }
            let candidate = self.index.get(&key).and_then(|versions| {
                versions
                    .iter()
                    .filter(|v| req.is_satisfied_by(v))
                    .filter(|v| !v.is_prerelease() || req.allows_prereleases())
                    .max()
            });
            match candidate {
                Some(version) => resolved.push((key, version.clone())),
                None => {
                    return Err(ProvisionError::DependencyResolutionError {
                        requirement: req.as_str().to_string(),
                        code: Some(1),
                        message: format!("no matching distribution found for {}", req),
                    })
                }
            }
        }
        Ok(resolved)
    }
}

impl DependencyInstaller for InMemoryInstaller {
    fn name(&self) -> &str {
        "memory-pip"
    }

    fn version(&self) -> Result<Option<Version>> {
        if self.version_query_fails {
            return Err(ProvisionError::CommandFailed {
                command: "memory-pip --version".to_string(),
                code: None,
            });
        }
        Ok(self.version.clone())
    }

    fn upgrade_self(&mut self) -> Result<()> {
        self.upgrade_calls += 1;
        record(&self.events, "installer:upgrade".to_string());

        if self.offline || self.upgrade_fails {
            return Err(ProvisionError::UpgradeError {
                installer: "pip".to_string(),
                code: Some(1),
                message: "could not reach the package index".to_string(),
            });
        }
        if let Some(target) = &self.upgrade_to {
            self.version = Some(target.clone());
        }
        Ok(())
    }

    fn installed(&self) -> Result<BTreeMap<String, Version>> {
        Ok(self.installed.clone())
    }

    fn install(&mut self, manifest: &Manifest) -> Result<InstallReport> {
        self.install_calls += 1;
        let entries: Vec<&str> = manifest.entries().iter().map(|r| r.as_str()).collect();
        record(&self.events, format!("installer:install {}", entries.join(" ")));

        if self.offline {
            let requirement = manifest
                .entries()
                .first()
                .map(|r| r.as_str().to_string())
                .unwrap_or_default();
            return Err(ProvisionError::DependencyResolutionError {
                requirement,
                code: Some(1),
                message: "network unavailable".to_string(),
            });
        }

        let resolved = self.resolve(manifest)?;
        let changed: BTreeSet<&str> = resolved.iter().map(|(k, _)| k.as_str()).collect();
        let host = HostPlatform::current();
        let already_present = manifest
            .entries()
            .iter()
            .filter(|r| r.applies_to(&host) != Some(false))
            .map(|r| r.key())
            .filter(|k| !changed.contains(k.as_str()))
            .collect();
        let installed = resolved
            .iter()
            .map(|(key, version)| format!("{}=={}", key, version))
            .collect();

        for (key, version) in resolved {
            self.installed.insert(key, version);
        }

        Ok(InstallReport {
            installed,
            already_present,
        })
    }

    fn upgrade_command(&self) -> CommandSpec {
        CommandSpec::new("memory-pip", ["install", "--upgrade", "pip"])
    }

    fn install_command(&self, manifest: &Manifest) -> CommandSpec {
        CommandSpec::new("memory-pip", ["install", "-r"]).arg(manifest.path().display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn manifest(content: &str) -> Manifest {
        Manifest::parse(content, Path::new("requirements.txt")).unwrap()
    }

    #[test]
    fn store_installs_missing_in_one_transaction() {
        let mut store = InMemoryPackageStore::new().with_available(["a", "b", "c"]);
        let report = store.ensure_installed(&set(&["a", "b"])).unwrap();
        assert_eq!(report.installed, vec!["a", "b"]);
        assert_eq!(store.transactions(), 1);
        assert!(store.is_installed("a").unwrap());
        assert!(!store.is_installed("c").unwrap());
    }

    #[test]
    fn store_skips_transaction_when_present() {
        let mut store = InMemoryPackageStore::new().with_installed(["a"]);
        let report = store.ensure_installed(&set(&["a"])).unwrap();
        assert!(report.is_unchanged());
        assert_eq!(store.transactions(), 0);
    }

    #[test]
    fn unknown_package_fails_whole_transaction() {
        let mut store = InMemoryPackageStore::new().with_available(["tesseract-ocr"]);
        let err = store
            .ensure_installed(&set(&["tesseract-ocr", "not-a-real-package-xyz"]))
            .unwrap_err();
        match err {
            ProvisionError::PackageManagerError { kind, .. } => assert_eq!(
                kind,
                PackageFailure::UnknownPackage {
                    name: "not-a-real-package-xyz".into()
                }
            ),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.installed().is_empty());
    }

    #[test]
    fn offline_and_locked_kinds() {
        let mut offline = InMemoryPackageStore::new().with_available(["a"]).offline();
        assert!(matches!(
            offline.ensure_installed(&set(&["a"])),
            Err(ProvisionError::PackageManagerError {
                kind: PackageFailure::Network,
                ..
            })
        ));

        let mut locked = InMemoryPackageStore::new().with_available(["a"]).locked();
        assert!(matches!(
            locked.ensure_installed(&set(&["a"])),
            Err(ProvisionError::PackageManagerError {
                kind: PackageFailure::LockUnavailable,
                ..
            })
        ));
    }

    #[test]
    fn installer_picks_highest_matching_version() {
        let mut installer = InMemoryInstaller::new().with_package("requests", &["2.31.0", "2.32.3"]);
        installer.install(&manifest("requests>=2.0\n")).unwrap();
        assert_eq!(installer.installed_version("requests").unwrap().as_str(), "2.32.3");
    }

    #[test]
    fn installer_skips_prereleases_unless_asked() {
        let mut installer =
            InMemoryInstaller::new().with_package("httpx", &["0.27.0", "1.0b1"]);
        installer.install(&manifest("httpx\n")).unwrap();
        assert_eq!(installer.installed_version("httpx").unwrap().as_str(), "0.27.0");
    }

    #[test]
    fn installer_reports_first_unsatisfiable_entry() {
        let mut installer = InMemoryInstaller::new()
            .with_package("fastapi", &["0.110.0"])
            .with_package("requests", &["2.31.0"]);
        let err = installer
            .install(&manifest("fastapi\nrequests==99.0\nmissing-pkg\n"))
            .unwrap_err();
        match err {
            ProvisionError::DependencyResolutionError { requirement, .. } => {
                assert_eq!(requirement, "requests==99.0")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(installer.installed_version("fastapi").is_none());
    }

    #[test]
    fn installer_upgrade_bumps_version() {
        let mut installer = InMemoryInstaller::new();
        installer.upgrade_self().unwrap();
        assert_eq!(installer.version().unwrap().unwrap().as_str(), "24.0");
    }

    #[test]
    fn events_are_shared() {
        let events = EventLog::default();
        let mut store = InMemoryPackageStore::new()
            .with_available(["a"])
            .with_events(events.clone());
        let mut installer = InMemoryInstaller::new()
            .with_package("b", &["1.0"])
            .with_events(events.clone());

        store.ensure_installed(&set(&["a"])).unwrap();
        installer.upgrade_self().unwrap();
        installer.install(&manifest("b\n")).unwrap();

        let log = events.lock().unwrap();
        assert_eq!(
            *log,
            vec!["system:install a", "installer:upgrade", "installer:install b"]
        );
    }
}
