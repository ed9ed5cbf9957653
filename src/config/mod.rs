//! Configuration loading, parsing, and validation.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use cps_provision::config::{load_config, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! fs::write(temp.path().join("provision.yml"), "system:\n  manager: apt\n").unwrap();
//!
//! let loaded = load_config(temp.path(), None).unwrap();
//! validate(&loaded.config).unwrap();
//! assert_eq!(loaded.config.system.packages, vec!["tesseract-ocr", "poppler-utils"]);
//! ```

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::{
    find_config, load_config, load_config_file, parse_config, LoadedConfig, CONFIG_FILE_NAME,
};
pub use schema::{
    json_schema, DependenciesConfig, InstallerConfig, ManagerKind, ProvisionConfig, Settings,
    SudoPolicy, SystemConfig, UpgradePolicy, VerifyConfig,
};
pub use validator::{validate, validate_config, ValidationError};
