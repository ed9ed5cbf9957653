//! Provisioning steps.
//!
//! A run is a fixed sequence of typed steps:
//!
//! 1. [`InstallSystemPackages`] - OS packages in one manager transaction
//! 2. [`UpgradeInstaller`] - upgrade pip itself
//! 3. [`InstallDependencies`] - the dependency manifest
//! 4. [`VerifyTools`] - required binaries resolve on PATH
//!
//! Each step talks to the host only through the stores in [`Host`], so the
//! same steps run against the real package manager or the in-memory fakes.
//!
//! # Example
//!
//! ```
//! use cps_provision::steps::{Host, InstallSystemPackages, Step, StepStatus};
//! use cps_provision::store::{InMemoryInstaller, InMemoryPackageStore};
//!
//! let mut system = InMemoryPackageStore::new().with_available(["tesseract-ocr"]);
//! let mut installer = InMemoryInstaller::new();
//! let mut host = Host::new(&mut system, &mut installer);
//!
//! let step = InstallSystemPackages::new(["tesseract-ocr"]);
//! assert_eq!(step.run(&mut host).unwrap().status, StepStatus::Completed);
//! assert_eq!(step.run(&mut host).unwrap().status, StepStatus::Unchanged);
//! ```

pub mod dependencies;
pub mod status;
pub mod system_packages;
pub mod upgrade;
pub mod verify;

pub use dependencies::InstallDependencies;
pub use status::{format_duration, StepOutcome, StepResult, StepStatus};
pub use system_packages::InstallSystemPackages;
pub use upgrade::UpgradeInstaller;
pub use verify::VerifyTools;

use crate::error::Result;
use crate::store::{DependencyInstaller, PackageStore};

/// The mutable host state steps act on.
pub struct Host<'a> {
    /// OS package store.
    pub system: &'a mut dyn PackageStore,
    /// Language dependency installer.
    pub installer: &'a mut dyn DependencyInstaller,
}

impl<'a> Host<'a> {
    /// Borrow both stores for a run.
    pub fn new(
        system: &'a mut dyn PackageStore,
        installer: &'a mut dyn DependencyInstaller,
    ) -> Self {
        Self { system, installer }
    }
}

/// One line of a read-only `check` report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    /// What was checked (a package, requirement or tool).
    pub label: String,
    /// Whether it is in place.
    pub ok: bool,
    /// Extra context (installed version, path, ...).
    pub detail: Option<String>,
}

impl CheckItem {
    /// Item that is in place.
    pub fn ok(label: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            label: label.into(),
            ok: true,
            detail,
        }
    }

    /// Item that is missing.
    pub fn missing(label: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            label: label.into(),
            ok: false,
            detail,
        }
    }
}

/// A single provisioning step.
pub trait Step {
    /// Short machine-friendly name (`system-packages`).
    fn name(&self) -> &str;

    /// One-line description for progress output.
    fn description(&self) -> String;

    /// Checks that must pass before any step mutates the host.
    fn preflight(&self) -> Result<()> {
        Ok(())
    }

    /// Commands this step would run, for dry runs.
    fn plan(&self, host: &Host<'_>) -> Result<Vec<String>>;

    /// Execute the step.
    fn run(&self, host: &mut Host<'_>) -> Result<StepOutcome>;

    /// Read-only report of what is and isn't in place.
    fn check(&self, host: &Host<'_>) -> Result<Vec<CheckItem>>;
}
