//! Provisioning pipeline behavior against the in-memory stores.

use std::fs;
use std::path::Path;

use cps_provision::config::{ProvisionConfig, UpgradePolicy};
use cps_provision::error::{PackageFailure, ProvisionError};
use cps_provision::runner::{Pipeline, PipelineResult, RunOptions};
use cps_provision::steps::{Host, StepStatus};
use cps_provision::store::{EventLog, InMemoryInstaller, InMemoryPackageStore};
use tempfile::TempDir;

fn project(manifest: &str) -> (TempDir, ProvisionConfig) {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("requirements.txt"), manifest).unwrap();
    let mut config = ProvisionConfig::default();
    config.verify.tools.clear();
    (temp, config)
}

fn run(
    config: &ProvisionConfig,
    root: &Path,
    system: &mut InMemoryPackageStore,
    installer: &mut InMemoryInstaller,
) -> PipelineResult {
    let pipeline = Pipeline::from_config(config, root, false).unwrap();
    let mut host = Host::new(system, installer);
    pipeline.run(&mut host, &RunOptions::default())
}

fn ocr_system() -> InMemoryPackageStore {
    InMemoryPackageStore::new().with_available(["tesseract-ocr", "poppler-utils"])
}

fn status(result: &PipelineResult, step: &str) -> StepStatus {
    result.step(step).unwrap().status
}

#[test]
fn second_run_is_a_no_op() {
    let (temp, config) = project("requests==2.31.0\nfastapi>=0.100\n");
    let mut system = ocr_system();
    let mut installer = InMemoryInstaller::new()
        .with_package("requests", &["2.31.0", "2.32.3"])
        .with_package("fastapi", &["0.110.0"]);

    let first = run(&config, temp.path(), &mut system, &mut installer);
    assert!(first.success(), "{:?}", first.error);
    assert_eq!(status(&first, "system-packages"), StepStatus::Completed);
    assert_eq!(status(&first, "dependencies"), StepStatus::Completed);

    let installed_before = system.installed().clone();
    let second = run(&config, temp.path(), &mut system, &mut installer);
    assert!(second.success());
    assert_eq!(status(&second, "system-packages"), StepStatus::Unchanged);
    assert_eq!(status(&second, "dependencies"), StepStatus::Unchanged);
    assert_eq!(system.transactions(), 1);
    assert_eq!(installer.install_calls(), 1);
    assert_eq!(system.installed(), &installed_before);
}

#[cfg(not(windows))]
#[test]
fn platform_excluded_entry_does_not_break_idempotence() {
    let (temp, config) = project("requests==2.31.0\npywin32>=306 ; sys_platform == \"win32\"\n");
    let mut system = ocr_system();
    let mut installer = InMemoryInstaller::new().with_package("requests", &["2.31.0"]);

    assert!(run(&config, temp.path(), &mut system, &mut installer).success());
    let second = run(&config, temp.path(), &mut system, &mut installer);

    assert!(second.success());
    assert_eq!(status(&second, "dependencies"), StepStatus::Unchanged);
    assert_eq!(installer.install_calls(), 1);
}

#[test]
fn unknown_package_stops_before_dependencies() {
    let (temp, mut config) = project("requests\n");
    config.system.packages = vec![
        "tesseract-ocr".to_string(),
        "not-a-real-package-xyz".to_string(),
    ];
    let mut system = InMemoryPackageStore::new().with_available(["tesseract-ocr"]);
    let mut installer = InMemoryInstaller::new().with_package("requests", &["2.31.0"]);

    let result = run(&config, temp.path(), &mut system, &mut installer);

    assert!(!result.success());
    assert_ne!(result.exit_code(), 0);
    match &result.error {
        Some(ProvisionError::PackageManagerError { kind, .. }) => assert_eq!(
            kind,
            &PackageFailure::UnknownPackage {
                name: "not-a-real-package-xyz".to_string()
            }
        ),
        other => panic!("expected PackageManagerError, got {:?}", other),
    }
    assert_eq!(status(&result, "upgrade-installer"), StepStatus::NotRun);
    assert_eq!(status(&result, "dependencies"), StepStatus::NotRun);
    assert_eq!(installer.install_calls(), 0);
    assert!(system.installed().is_empty());
}

#[test]
fn installed_set_covers_manifest_and_is_additive() {
    let (temp, config) = project("requests==2.31.0\nfastapi\n");
    let mut system = ocr_system();
    let mut installer = InMemoryInstaller::new()
        .with_package("requests", &["2.31.0"])
        .with_package("fastapi", &["0.110.0"])
        .with_package("uvicorn", &["0.29.0"]);

    assert!(run(&config, temp.path(), &mut system, &mut installer).success());
    assert_eq!(installer.installed_version("requests").unwrap().as_str(), "2.31.0");
    assert!(installer.installed_version("fastapi").is_some());

    fs::write(temp.path().join("requirements.txt"), "requests==2.31.0\nuvicorn\n").unwrap();
    assert!(run(&config, temp.path(), &mut system, &mut installer).success());

    assert!(installer.installed_version("uvicorn").is_some());
    assert!(
        installer.installed_version("fastapi").is_some(),
        "entries dropped from the manifest stay installed"
    );
}

#[test]
fn steps_mutate_in_pipeline_order() {
    let (temp, config) = project("requests==2.31.0\n");
    let events = EventLog::default();
    let mut system = ocr_system().with_events(events.clone());
    let mut installer = InMemoryInstaller::new()
        .with_package("requests", &["2.31.0"])
        .with_events(events.clone());

    assert!(run(&config, temp.path(), &mut system, &mut installer).success());

    let events = events.lock().unwrap();
    let position = |prefix: &str| events.iter().position(|e| e.starts_with(prefix)).unwrap();
    assert!(position("system:install") < position("installer:upgrade"));
    assert!(position("installer:upgrade") < position("installer:install"));
}

#[test]
fn pinned_requirement_is_installed_exactly() {
    let (temp, config) = project("requests==2.31.0\n");
    let mut system = ocr_system();
    let mut installer =
        InMemoryInstaller::new().with_package("requests", &["2.30.0", "2.31.0", "2.32.3"]);

    let result = run(&config, temp.path(), &mut system, &mut installer);

    assert!(result.success());
    assert_eq!(installer.installed_version("requests").unwrap().as_str(), "2.31.0");
}

#[test]
fn unsatisfiable_requirement_is_named() {
    let (temp, config) = project("requests==99.0\n");
    let mut system = ocr_system();
    let mut installer = InMemoryInstaller::new().with_package("requests", &["2.31.0"]);

    let result = run(&config, temp.path(), &mut system, &mut installer);

    assert_eq!(result.failed_step.as_deref(), Some("dependencies"));
    match &result.error {
        Some(ProvisionError::DependencyResolutionError { requirement, .. }) => {
            assert_eq!(requirement, "requests==99.0")
        }
        other => panic!("expected DependencyResolutionError, got {:?}", other),
    }
    assert!(installer.installed_version("requests").is_none());
}

#[test]
fn offline_host_fails_with_network_error() {
    let (temp, config) = project("requests\n");
    let mut system = InMemoryPackageStore::new().offline();
    let mut installer = InMemoryInstaller::new().offline();

    let result = run(&config, temp.path(), &mut system, &mut installer);

    assert!(!result.success());
    assert_ne!(result.exit_code(), 0);
    assert!(matches!(
        result.error,
        Some(ProvisionError::PackageManagerError {
            kind: PackageFailure::Network,
            ..
        })
    ));
}

#[test]
fn held_lock_is_classified() {
    let (temp, config) = project("");
    let mut system = InMemoryPackageStore::new().locked();
    let mut installer = InMemoryInstaller::new();

    let result = run(&config, temp.path(), &mut system, &mut installer);

    assert!(matches!(
        result.error,
        Some(ProvisionError::PackageManagerError {
            kind: PackageFailure::LockUnavailable,
            ..
        })
    ));
}

#[test]
fn strict_upgrade_failure_is_fatal() {
    let (temp, config) = project("requests\n");
    let mut system = ocr_system();
    let mut installer = InMemoryInstaller::new()
        .with_package("requests", &["2.31.0"])
        .failing_upgrade();

    let result = run(&config, temp.path(), &mut system, &mut installer);

    assert_eq!(result.failed_step.as_deref(), Some("upgrade-installer"));
    assert!(matches!(result.error, Some(ProvisionError::UpgradeError { .. })));
    assert_eq!(installer.install_calls(), 0);
}

#[test]
fn lenient_upgrade_failure_continues() {
    let (temp, mut config) = project("requests\n");
    config.installer.upgrade_policy = UpgradePolicy::Lenient;
    config.installer.min_version = Some("21.0".to_string());
    let mut system = ocr_system();
    let mut installer = InMemoryInstaller::new()
        .with_package("requests", &["2.31.0"])
        .failing_upgrade();

    let result = run(&config, temp.path(), &mut system, &mut installer);

    assert!(result.success(), "{:?}", result.error);
    assert_eq!(status(&result, "upgrade-installer"), StepStatus::Warned);
    assert_eq!(status(&result, "dependencies"), StepStatus::Completed);
}

#[test]
fn lenient_upgrade_below_minimum_is_fatal() {
    let (temp, mut config) = project("requests\n");
    config.installer.upgrade_policy = UpgradePolicy::Lenient;
    config.installer.min_version = Some("24.0".to_string());
    let mut system = ocr_system();
    let mut installer = InMemoryInstaller::new()
        .with_version(Some("23.0.1"))
        .failing_upgrade();

    let result = run(&config, temp.path(), &mut system, &mut installer);

    assert_eq!(result.failed_step.as_deref(), Some("upgrade-installer"));
}

#[test]
fn disabled_upgrade_is_not_a_step() {
    let (temp, mut config) = project("");
    config.installer.upgrade = false;
    let mut system = ocr_system();
    let mut installer = InMemoryInstaller::new().failing_upgrade();

    let result = run(&config, temp.path(), &mut system, &mut installer);

    assert!(result.success());
    assert!(result.step("upgrade-installer").is_none());
    assert_eq!(installer.upgrade_calls(), 0);
}

#[test]
fn manifest_includes_are_installed() {
    let (temp, config) = project("-r base.txt\nfastapi\n");
    fs::write(temp.path().join("base.txt"), "requests==2.31.0\n").unwrap();
    let mut system = ocr_system();
    let mut installer = InMemoryInstaller::new()
        .with_package("requests", &["2.31.0"])
        .with_package("fastapi", &["0.110.0"]);

    let result = run(&config, temp.path(), &mut system, &mut installer);

    assert!(result.success(), "{:?}", result.error);
    assert!(installer.installed_version("requests").is_some());
    assert!(installer.installed_version("fastapi").is_some());
}
