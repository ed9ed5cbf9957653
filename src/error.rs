//! Error types for provisioning operations.
//!
//! This module defines [`ProvisionError`], the primary error type used
//! throughout the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Every step failure is fatal to the run and maps to a process exit code
//!   via [`ProvisionError::exit_code`]
//! - Use `anyhow::Error` (via `ProvisionError::Other`) for unexpected errors
//! - Messages name the package, requirement, or step that failed

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a host package manager invocation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageFailure {
    /// A requested package name is not known to the manager.
    UnknownPackage { name: String },
    /// Another process holds the package database lock.
    LockUnavailable,
    /// Package index or mirror could not be reached.
    Network,
    /// The manager needs more privileges than the provisioner has.
    PermissionDenied,
    /// Any other non-zero exit.
    Failed,
}

impl fmt::Display for PackageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageFailure::UnknownPackage { name } => {
                write!(f, "unable to locate package '{}'", name)
            }
            PackageFailure::LockUnavailable => write!(f, "package database lock unavailable"),
            PackageFailure::Network => write!(f, "network unavailable"),
            PackageFailure::PermissionDenied => write!(f, "permission denied"),
            PackageFailure::Failed => write!(f, "installation failed"),
        }
    }
}

/// Core error type for provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Configuration file not found at the explicitly requested location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// Dependency manifest does not exist.
    #[error("Manifest not found: {path}")]
    ManifestNotFound { path: PathBuf },

    /// Dependency manifest contains a line that is not a requirement or option.
    #[error("Failed to parse manifest {path} (line {line}): {message}")]
    ManifestParseError {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// No supported host package manager could be found.
    #[error("No supported package manager available: {message}")]
    PackageManagerUnavailable { message: String },

    /// Host package manager failed to install the requested packages.
    #[error("Package manager failed ({kind}) installing {}", .packages.join(", "))]
    PackageManagerError {
        packages: Vec<String>,
        kind: PackageFailure,
        code: Option<i32>,
        message: String,
    },

    /// The language package installer could not upgrade itself.
    #[error("Failed to upgrade {installer}: {message}")]
    UpgradeError {
        installer: String,
        code: Option<i32>,
        message: String,
    },

    /// A manifest entry cannot be satisfied.
    #[error("Cannot satisfy requirement '{requirement}': {message}")]
    DependencyResolutionError {
        requirement: String,
        code: Option<i32>,
        message: String,
    },

    /// A tool expected after installation is not on PATH.
    #[error("Tool '{tool}' not found on PATH: {hint}")]
    ToolMissing { tool: String, hint: String },

    /// A command could not be started at all.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProvisionError {
    /// Process exit code for this error.
    ///
    /// Configuration and manifest problems exit with 2. Package manager and
    /// installer failures propagate the underlying exit code when there is
    /// one; everything else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::ConfigNotFound { .. }
            | ProvisionError::ConfigParseError { .. }
            | ProvisionError::ConfigValidationError { .. }
            | ProvisionError::ManifestNotFound { .. }
            | ProvisionError::ManifestParseError { .. } => 2,
            ProvisionError::PackageManagerError { code, .. }
            | ProvisionError::UpgradeError { code, .. }
            | ProvisionError::DependencyResolutionError { code, .. } => match code {
                Some(c) if (1..=255).contains(c) => *c,
                _ => 1,
            },
            _ => 1,
        }
    }
}

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;
