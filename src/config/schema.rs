//! Configuration schema definitions.
//!
//! This module contains the struct definitions that map to the
//! `provision.yml` file format. Every field has a default, so an empty
//! file (or no file at all) reproduces the stock install: Tesseract and
//! Poppler from the host package manager, a pip upgrade, then
//! `requirements.txt`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for provision.yml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    /// Host package manager settings
    pub system: SystemConfig,

    /// Language package installer settings
    pub installer: InstallerConfig,

    /// Application dependency manifest
    pub dependencies: DependenciesConfig,

    /// Post-install tool verification
    pub verify: VerifyConfig,

    /// Global settings
    pub settings: Settings,
}

/// Host package manager to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    /// Detect from PATH (apt, dnf, yum, apk, pacman, brew in that order)
    #[default]
    Auto,
    Apt,
    Dnf,
    Yum,
    Apk,
    Pacman,
    Brew,
}

/// When to prefix package manager commands with `sudo`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SudoPolicy {
    /// Use sudo when not root and sudo is available
    #[default]
    Auto,
    Always,
    Never,
}

/// What to do when the installer cannot upgrade itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UpgradePolicy {
    /// Any upgrade failure stops the run
    #[default]
    Strict,
    /// Continue with a warning if the current version is adequate
    Lenient,
}

/// Host package manager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    /// Package manager (auto, apt, dnf, yum, apk, pacman, brew)
    pub manager: ManagerKind,

    /// Packages to install in a single transaction
    pub packages: Vec<String>,

    /// Privilege escalation policy
    pub use_sudo: SudoPolicy,

    /// Refresh the package index before installing (apt only)
    pub refresh_index: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            manager: ManagerKind::Auto,
            packages: default_packages(),
            use_sudo: SudoPolicy::Auto,
            refresh_index: true,
        }
    }
}

fn default_packages() -> Vec<String> {
    vec!["tesseract-ocr".to_string(), "poppler-utils".to_string()]
}

/// Language package installer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    /// Python interpreter used to run `-m pip`
    pub python: String,

    /// Upgrade the installer before installing dependencies
    pub upgrade: bool,

    /// Failure policy for the upgrade step
    pub upgrade_policy: UpgradePolicy,

    /// Minimum acceptable installer version under the lenient policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            upgrade: true,
            upgrade_policy: UpgradePolicy::Strict,
            min_version: None,
        }
    }
}

/// Application dependency manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct DependenciesConfig {
    /// Manifest path, relative to the project directory
    pub manifest: PathBuf,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("requirements.txt"),
        }
    }
}

/// Post-install tool verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    /// Executables that must be on PATH after provisioning
    pub tools: Vec<String>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            tools: vec!["tesseract".to_string(), "pdftoppm".to_string()],
        }
    }
}

/// Global settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory for run records, relative to the project directory
    pub state_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".provision"),
        }
    }
}

/// JSON Schema for provision.yml.
pub fn json_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(ProvisionConfig)).unwrap_or_default()
}
