//! Configuration file discovery and loading.
//!
//! There is a single configuration file, `provision.yml`, looked up in the
//! project directory unless a path is given explicitly. A missing project
//! file is not an error: built-in defaults apply. A missing explicit file is.

use crate::config::schema::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = "provision.yml";

/// A loaded configuration and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The parsed configuration (defaults when no file was found).
    pub config: ProvisionConfig,
    /// The file it was read from, if any.
    pub source: Option<PathBuf>,
}

/// Locate the configuration file.
///
/// An explicit path must exist. Otherwise `provision.yml` in the project
/// directory is used when present.
pub fn find_config(project_root: &Path, explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(ProvisionError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        return Ok(Some(path.to_path_buf()));
    }

    let path = project_root.join(CONFIG_FILE_NAME);
    Ok(path.is_file().then_some(path))
}

/// Load configuration for a project.
pub fn load_config(project_root: &Path, explicit: Option<&Path>) -> Result<LoadedConfig> {
    match find_config(project_root, explicit)? {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let config = load_config_file(&path)?;
            Ok(LoadedConfig {
                config,
                source: Some(path),
            })
        }
        None => {
            tracing::debug!(
                "no {} in {}, using defaults",
                CONFIG_FILE_NAME,
                project_root.display()
            );
            Ok(LoadedConfig {
                config: ProvisionConfig::default(),
                source: None,
            })
        }
    }
}

/// Load and parse a single config file.
pub fn load_config_file(path: &Path) -> Result<ProvisionConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProvisionError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ProvisionError::Io(e)
        }
    })?;
    parse_config(&content, path)
}

/// Parse configuration content. An empty document yields the defaults.
pub fn parse_config(content: &str, path: &Path) -> Result<ProvisionConfig> {
    let parse_error = |e: serde_yaml::Error| ProvisionError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(parse_error)?;
    if value.is_null() {
        return Ok(ProvisionConfig::default());
    }
    serde_yaml::from_value(value).map_err(parse_error)
}
