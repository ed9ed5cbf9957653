//! cps-provision - host provisioning for the Check Print System backend.
//!
//! Installs the OS packages the OCR pipeline needs, upgrades `pip`, and
//! installs the pinned Python dependencies from `requirements.txt`, as an
//! ordered, fail-fast pipeline of typed steps.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - `provision.yml` loading, schema and validation
//! - [`error`] - Error types and result aliases
//! - [`manifest`] - Dependency manifest (`requirements.txt`) parsing
//! - [`runner`] - Pipeline execution and failure classification
//! - [`shell`] - Command execution
//! - [`state`] - Last-run records
//! - [`steps`] - The provisioning steps
//! - [`store`] - Package stores: host package manager, pip, in-memory fakes
//! - [`ui`] - Terminal output
//!
//! # Example
//!
//! ```
//! use cps_provision::config::ProvisionConfig;
//! use cps_provision::runner::{Pipeline, RunOptions};
//! use cps_provision::steps::Host;
//! use cps_provision::store::{InMemoryInstaller, InMemoryPackageStore};
//!
//! let project = tempfile::tempdir().unwrap();
//! std::fs::write(project.path().join("requirements.txt"), "requests==2.31.0\n").unwrap();
//!
//! let mut config = ProvisionConfig::default();
//! config.verify.tools.clear();
//!
//! let mut system = InMemoryPackageStore::new().with_available(["tesseract-ocr", "poppler-utils"]);
//! let mut installer = InMemoryInstaller::new().with_package("requests", &["2.31.0"]);
//! let mut host = Host::new(&mut system, &mut installer);
//!
//! let pipeline = Pipeline::from_config(&config, project.path(), false).unwrap();
//! let result = pipeline.run(&mut host, &RunOptions::default());
//! assert!(result.success());
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod runner;
pub mod shell;
pub mod state;
pub mod steps;
pub mod store;
pub mod ui;

pub use error::{ProvisionError, Result};
