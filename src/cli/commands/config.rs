//! Config command implementation.
//!
//! The `cps-provision config` command shows the resolved configuration.

use crate::cli::args::ConfigArgs;
use crate::config::json_schema;
use crate::error::{ProvisionError, Result};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandContext, CommandResult};

/// The config command implementation.
pub struct ConfigCommand {
    context: CommandContext,
    args: ConfigArgs,
}

impl ConfigCommand {
    /// Create a new config command.
    pub fn new(context: CommandContext, args: ConfigArgs) -> Self {
        Self { context, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &ConfigArgs {
        &self.args
    }
}

impl Command for ConfigCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        if self.args.schema {
            let schema = serde_json::to_string_pretty(&json_schema())
                .map_err(|e| ProvisionError::Other(e.into()))?;
            ui.message(&schema);
            return Ok(CommandResult::success());
        }

        let loaded = self.context.load_config()?;

        if self.args.json {
            let json = serde_json::to_string_pretty(&loaded.config)
                .map_err(|e| ProvisionError::Other(e.into()))?;
            ui.message(&json);
        } else {
            match &loaded.source {
                Some(path) => ui.message(&format!("# {}", path.display())),
                None => ui.message("# built-in defaults"),
            }
            let yaml = serde_yaml::to_string(&loaded.config)
                .map_err(|e| ProvisionError::Other(e.into()))?;
            ui.message(yaml.trim_end());
        }

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn command(temp: &TempDir, args: ConfigArgs) -> ConfigCommand {
        ConfigCommand::new(CommandContext::new(temp.path().to_path_buf(), None), args)
    }

    #[test]
    fn shows_defaults_without_file() {
        let temp = TempDir::new().unwrap();
        let mut ui = MockUI::new();

        let result = command(&temp, ConfigArgs::default())
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        assert!(ui.has_message("# built-in defaults"));
        assert!(ui.has_message("tesseract-ocr"));
        assert!(ui.has_message("requirements.txt"));
    }

    #[test]
    fn shows_config_path() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("provision.yml"),
            "installer:\n  python: python3.12\n",
        )
        .unwrap();
        let mut ui = MockUI::new();

        command(&temp, ConfigArgs::default())
            .execute(&mut ui)
            .unwrap();

        assert!(ui.has_message("provision.yml"));
        assert!(ui.has_message("python3.12"));
    }

    #[test]
    fn json_output_parses() {
        let temp = TempDir::new().unwrap();
        let mut ui = MockUI::new();
        let args = ConfigArgs {
            json: true,
            schema: false,
        };

        command(&temp, args).execute(&mut ui).unwrap();

        let value: serde_json::Value = serde_json::from_str(&ui.messages()[0]).unwrap();
        assert_eq!(value["installer"]["upgrade_policy"], "strict");
        assert_eq!(value["verify"]["tools"][0], "tesseract");
    }

    #[test]
    fn schema_output_needs_no_config() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("provision.yml"), "not: [valid").unwrap();
        let mut ui = MockUI::new();
        let args = ConfigArgs {
            json: false,
            schema: true,
        };

        let result = command(&temp, args).execute(&mut ui).unwrap();

        assert!(result.success);
        let value: serde_json::Value = serde_json::from_str(&ui.messages()[0]).unwrap();
        assert!(value["properties"]["system"].is_object());
    }

    #[test]
    fn invalid_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("provision.yml"), "unknown_key: 1\n").unwrap();
        let mut ui = MockUI::new();

        let err = command(&temp, ConfigArgs::default())
            .execute(&mut ui)
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
