//! Check command implementation.
//!
//! `cps-provision check` reports which system packages, manifest entries and
//! tools are in place without changing the host.

use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::runner::Pipeline;
use crate::state::StateStore;
use crate::steps::{CheckItem, Host};
use crate::store::{DependencyInstaller, PackageStore, PipInstaller, SystemStore};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandContext, CommandResult};

/// The check command implementation.
pub struct CheckCommand {
    context: CommandContext,
}

impl CheckCommand {
    /// Create a new check command.
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }

    /// Check the host through the given stores.
    ///
    /// Exits 0 when everything is in place, 1 otherwise.
    pub fn check_with(
        &self,
        config: &ProvisionConfig,
        system: &mut dyn PackageStore,
        installer: &mut dyn DependencyInstaller,
        ui: &mut dyn UserInterface,
    ) -> Result<CommandResult> {
        let root = &self.context.project_root;
        let pipeline = Pipeline::from_config(config, root, false)?;
        let host = Host::new(system, installer);
        let verbose = ui.output_mode().shows_details();

        ui.show_header("cps-provision check");

        let mut gaps = 0;
        for step in pipeline.steps() {
            let mut spinner = ui.start_spinner(&format!("Checking {}", step.name()));
            match step.check(&host) {
                Ok(items) => {
                    let missing: Vec<&CheckItem> = items.iter().filter(|i| !i.ok).collect();
                    if missing.is_empty() {
                        spinner.finish_success(&format!("{}: {} ok", step.name(), items.len()));
                    } else {
                        spinner.finish_error(&format!(
                            "{}: {} of {} missing",
                            step.name(),
                            missing.len(),
                            items.len()
                        ));
                    }
                    for item in items.iter().filter(|i| verbose || !i.ok) {
                        ui.message(&format_item(item));
                    }
                    gaps += missing.len();
                }
                Err(e) => {
                    spinner.finish_error(&format!("{}: {}", step.name(), e));
                    gaps += 1;
                }
            }
        }

        self.note_manifest_change(config, ui);

        if gaps == 0 {
            ui.success("Host is provisioned");
            Ok(CommandResult::success())
        } else {
            ui.error(&format!(
                "{} item{} missing; run `cps-provision` to provision",
                gaps,
                if gaps == 1 { "" } else { "s" }
            ));
            Ok(CommandResult::failure(1))
        }
    }

    fn note_manifest_change(&self, config: &ProvisionConfig, ui: &mut dyn UserInterface) {
        let root = &self.context.project_root;
        let store = StateStore::new(root, &config.settings.state_dir);
        let last = match store.load_last_run() {
            Ok(Some(record)) if record.success => record,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!("ignoring unreadable run record: {}", e);
                return;
            }
        };

        let manifest_path = root.join(&config.dependencies.manifest);
        let current = Manifest::load(&manifest_path)
            .ok()
            .map(|m| m.digest().to_string());
        if current.is_some() && current != last.manifest_sha256 {
            ui.warning(&format!(
                "{} changed since the last successful run ({})",
                config.dependencies.manifest.display(),
                last.finished_at.format("%Y-%m-%d %H:%M UTC")
            ));
        }
    }
}

impl Command for CheckCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let loaded = self.context.load_config()?;
        let config = &loaded.config;

        let mut system = SystemStore::from_config(&config.system)?.echo(false);
        let mut installer = PipInstaller::new(config.installer.python.clone()).echo(false);

        self.check_with(config, &mut system, &mut installer, ui)
    }
}

fn format_item(item: &CheckItem) -> String {
    let mark = if item.ok { '✓' } else { '✗' };
    match &item.detail {
        Some(detail) => format!("    {} {} ({})", mark, item.label, detail),
        None => format!("    {} {}", mark, item.label),
    }
}
