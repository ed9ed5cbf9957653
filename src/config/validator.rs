//! Configuration validation rules.
//!
//! Checks that the parsed configuration is usable before any step runs:
//! - package and tool names are non-empty and contain no whitespace
//! - `installer.min_version` parses as a version
//! - the manifest path and python interpreter are non-empty

use crate::config::schema::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::manifest::Version;

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Config key the error refers to, e.g. `system.packages`
    pub field: String,
    /// Human-readable error message
    pub message: String,
}

/// Validate a configuration and return all errors.
///
/// Collects every problem rather than stopping at the first one.
pub fn validate_config(config: &ProvisionConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_names("system.packages", &config.system.packages));
    errors.extend(validate_names("verify.tools", &config.verify.tools));

    if config.installer.python.trim().is_empty() {
        errors.push(ValidationError {
            field: "installer.python".to_string(),
            message: "interpreter must not be empty".to_string(),
        });
    }

    if let Some(min) = &config.installer.min_version {
        if let Err(e) = min.parse::<Version>() {
            errors.push(ValidationError {
                field: "installer.min_version".to_string(),
                message: e,
            });
        }
    }

    if config.dependencies.manifest.as_os_str().is_empty() {
        errors.push(ValidationError {
            field: "dependencies.manifest".to_string(),
            message: "manifest path must not be empty".to_string(),
        });
    }

    if config.settings.state_dir.as_os_str().is_empty() {
        errors.push(ValidationError {
            field: "settings.state_dir".to_string(),
            message: "state directory must not be empty".to_string(),
        });
    }

    errors
}

fn validate_names(field: &str, names: &[String]) -> Vec<ValidationError> {
    names
        .iter()
        .filter_map(|name| {
            let message = if name.is_empty() {
                "empty name".to_string()
            } else if name.chars().any(char::is_whitespace) {
                format!("'{}' contains whitespace", name)
            } else {
                return None;
            };
            Some(ValidationError {
                field: field.to_string(),
                message,
            })
        })
        .collect()
}

/// Validate a configuration, failing with every problem in one message.
pub fn validate(config: &ProvisionConfig) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        return Ok(());
    }

    let message = errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ");
    Err(ProvisionError::ConfigValidationError { message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&ProvisionConfig::default()).is_ok());
    }

    #[test]
    fn whitespace_in_package_name() {
        let mut config = ProvisionConfig::default();
        config.system.packages.push("poppler utils".to_string());
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "system.packages");
        assert!(errors[0].message.contains("poppler utils"));
    }

    #[test]
    fn empty_tool_name() {
        let mut config = ProvisionConfig::default();
        config.verify.tools = vec![String::new()];
        let errors = validate_config(&config);
        assert_eq!(errors[0].field, "verify.tools");
    }

    #[test]
    fn bad_min_version() {
        let mut config = ProvisionConfig::default();
        config.installer.min_version = Some("twenty-three".to_string());
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("installer.min_version"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn collects_all_errors() {
        let mut config = ProvisionConfig::default();
        config.dependencies.manifest = PathBuf::new();
        config.installer.python = " ".to_string();
        config.system.packages = vec!["a b".to_string()];
        assert_eq!(validate_config(&config).len(), 3);
    }

    #[test]
    fn empty_package_list_is_valid() {
        let mut config = ProvisionConfig::default();
        config.system.packages.clear();
        config.verify.tools.clear();
        assert!(validate(&config).is_ok());
    }
}
