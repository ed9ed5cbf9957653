use super::{CheckItem, Host, Step, StepOutcome};
use crate::error::Result;
use crate::manifest::{HostPlatform, Manifest};
use crate::store::{entry_state, needs_install, EntryState};
use std::path::{Path, PathBuf};

/// Install the application's dependency manifest.
///
/// The manifest is re-read on every run. When the installed set already
/// satisfies every entry the installer isn't invoked at all.
#[derive(Debug, Clone)]
pub struct InstallDependencies {
    manifest: PathBuf,
}

impl InstallDependencies {
    pub fn new(manifest: impl Into<PathBuf>) -> Self {
        Self {
            manifest: manifest.into(),
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }

    fn load(&self) -> Result<Manifest> {
        Manifest::load(&self.manifest)
    }
}

impl Step for InstallDependencies {
    fn name(&self) -> &str {
        "dependencies"
    }

    fn description(&self) -> String {
        format!("Installing dependencies from {}", self.manifest.display())
    }

    fn preflight(&self) -> Result<()> {
        self.load().map(|_| ())
    }

    fn plan(&self, host: &Host<'_>) -> Result<Vec<String>> {
        let manifest = self.load()?;
        if manifest.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![host.installer.install_command(&manifest).to_string()])
    }

    fn run(&self, host: &mut Host<'_>) -> Result<StepOutcome> {
        let manifest = self.load()?;
        if manifest.is_empty() {
            return Ok(StepOutcome::unchanged("manifest lists no requirements"));
        }

        let installed = host.installer.installed()?;
        if !needs_install(&manifest, &installed) {
            tracing::debug!(
                "all {} requirements in {} satisfied",
                manifest.len(),
                manifest.path().display()
            );
            return Ok(StepOutcome::unchanged(format!(
                "{} requirements already satisfied",
                manifest.len()
            )));
        }

        let report = host.installer.install(&manifest)?;
        if report.is_unchanged() {
            return Ok(StepOutcome::unchanged(format!(
                "{} requirements already satisfied",
                manifest.len()
            )));
        }
        Ok(StepOutcome::completed(format!(
            "installed {}",
            report.installed.join(", ")
        )))
    }

    fn check(&self, host: &Host<'_>) -> Result<Vec<CheckItem>> {
        let manifest = self.load()?;
        let installed = host.installer.installed()?;
        let platform = HostPlatform::current();

        Ok(manifest
            .entries()
            .iter()
            .map(|req| {
                let label = req.as_str();
                match entry_state(req, &installed, &platform) {
                    EntryState::Satisfied(v) => CheckItem::ok(label, Some(v.to_string())),
                    EntryState::Outdated(v) => {
                        CheckItem::missing(label, Some(format!("{} installed", v)))
                    }
                    EntryState::Missing => {
                        CheckItem::missing(label, Some("not installed".to_string()))
                    }
                    EntryState::Excluded => {
                        CheckItem::ok(label, Some("marker excludes this host".to_string()))
                    }
                    EntryState::Undecided => {
                        CheckItem::ok(label, Some("marker not evaluated".to_string()))
                    }
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use crate::steps::StepStatus;
    use crate::store::{InMemoryInstaller, InMemoryPackageStore};
    use std::fs;
    use tempfile::TempDir;

    fn manifest_file(content: &str) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("requirements.txt");
        fs::write(&path, content).unwrap();
        (temp, path)
    }

    #[test]
    fn installs_then_is_unchanged() {
        let (_temp, path) = manifest_file("requests==2.31.0\nfastapi>=0.110\n");
        let mut system = InMemoryPackageStore::new();
        let mut installer = InMemoryInstaller::new()
            .with_package("requests", &["2.31.0", "2.32.3"])
            .with_package("fastapi", &["0.110.0"]);
        let step = InstallDependencies::new(&path);

        {
            let mut host = Host::new(&mut system, &mut installer);
            let first = step.run(&mut host).unwrap();
            assert_eq!(first.status, StepStatus::Completed);
            let second = step.run(&mut host).unwrap();
            assert_eq!(second.status, StepStatus::Unchanged);
        }
        assert_eq!(installer.install_calls(), 1);
        assert_eq!(installer.installed_version("requests").unwrap().as_str(), "2.31.0");
    }

    #[test]
    fn preflight_fails_for_missing_manifest() {
        let temp = TempDir::new().unwrap();
        let step = InstallDependencies::new(temp.path().join("requirements.txt"));
        assert!(matches!(
            step.preflight(),
            Err(ProvisionError::ManifestNotFound { .. })
        ));
    }

    #[test]
    fn preflight_fails_for_bad_manifest() {
        let (_temp, path) = manifest_file("requests\nnot a requirement!\n");
        let step = InstallDependencies::new(&path);
        assert!(matches!(
            step.preflight(),
            Err(ProvisionError::ManifestParseError { line: 2, .. })
        ));
    }

    #[test]
    fn empty_manifest_is_unchanged() {
        let (_temp, path) = manifest_file("# nothing\n");
        let mut system = InMemoryPackageStore::new();
        let mut installer = InMemoryInstaller::new();
        let mut host = Host::new(&mut system, &mut installer);
        let step = InstallDependencies::new(&path);

        assert_eq!(step.run(&mut host).unwrap().status, StepStatus::Unchanged);
        assert!(step.plan(&host).unwrap().is_empty());
    }

    #[cfg(not(windows))]
    #[test]
    fn platform_excluded_entry_keeps_run_and_check_clean() {
        let (_temp, path) = manifest_file(
            "requests==2.31.0\npywin32>=306 ; sys_platform == \"win32\"\n",
        );
        let mut system = InMemoryPackageStore::new();
        let mut installer = InMemoryInstaller::new().with_package("requests", &["2.31.0"]);
        let step = InstallDependencies::new(&path);

        {
            let mut host = Host::new(&mut system, &mut installer);
            assert_eq!(step.run(&mut host).unwrap().status, StepStatus::Completed);
            assert_eq!(step.run(&mut host).unwrap().status, StepStatus::Unchanged);
            let items = step.check(&host).unwrap();
            assert!(items.iter().all(|i| i.ok));
            assert_eq!(items[1].detail.as_deref(), Some("marker excludes this host"));
        }
        assert_eq!(installer.install_calls(), 1);
        assert!(installer.installed_version("pywin32").is_none());
    }

    #[test]
    fn undecided_marker_is_not_a_check_gap() {
        let (_temp, path) = manifest_file("tomli ; python_version < \"3.11\"\n");
        let mut system = InMemoryPackageStore::new();
        let mut installer = InMemoryInstaller::new();
        let host = Host::new(&mut system, &mut installer);

        let items = InstallDependencies::new(&path).check(&host).unwrap();
        assert!(items[0].ok);
        assert_eq!(items[0].detail.as_deref(), Some("marker not evaluated"));
    }

    #[test]
    fn check_marks_unsatisfied_entries() {
        let (_temp, path) = manifest_file("requests==2.31.0\nfastapi\n");
        let mut system = InMemoryPackageStore::new();
        let mut installer = InMemoryInstaller::new()
            .with_installed("requests", "2.32.3")
            .with_installed("fastapi", "0.110.0");
        let host = Host::new(&mut system, &mut installer);

        let items = InstallDependencies::new(&path).check(&host).unwrap();
        assert!(!items[0].ok);
        assert_eq!(items[0].detail.as_deref(), Some("2.32.3 installed"));
        assert!(items[1].ok);
    }
}
