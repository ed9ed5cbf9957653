//! Run command implementation.
//!
//! `cps-provision run` (or no command at all) executes the provisioning
//! pipeline against the real host and records the outcome.

use std::path::Path;

use crate::cli::args::RunArgs;
use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::manifest::Manifest;
use crate::runner::patterns::{find_hint, OutputSource};
use crate::runner::{Pipeline, PipelineResult, RunOptions, RunProgress};
use crate::state::{RunRecordBuilder, StateStore};
use crate::steps::{Host, StepResult, StepStatus};
use crate::store::{DependencyInstaller, PackageStore, PipInstaller, SystemStore};
use crate::ui::{RunSummary, UserInterface};

use super::dispatcher::{Command, CommandContext, CommandResult};

/// The run command implementation.
pub struct RunCommand {
    context: CommandContext,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(context: CommandContext, args: RunArgs) -> Self {
        Self { context, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    /// Run the pipeline against the given stores and report to the UI.
    ///
    /// The run record is written unless this is a dry run.
    pub fn run_with(
        &self,
        config: &ProvisionConfig,
        system: &mut dyn PackageStore,
        installer: &mut dyn DependencyInstaller,
        ui: &mut dyn UserInterface,
    ) -> Result<CommandResult> {
        let root = &self.context.project_root;
        let pipeline = Pipeline::from_config(config, root, self.args.skip_upgrade)?;
        let options = RunOptions {
            dry_run: self.args.dry_run,
        };

        let title = if options.dry_run {
            "cps-provision (dry run)"
        } else {
            "cps-provision"
        };
        ui.show_header(title);

        let builder = RunRecordBuilder::start().manifest_digest(manifest_digest(
            &root.join(&config.dependencies.manifest),
        ));

        let result = {
            let mut host = Host::new(system, installer);
            pipeline.run_with_progress(&mut host, &options, |event| report(ui, event))
        };

        if !options.dry_run {
            let record = builder.finish(&result);
            StateStore::new(root, &config.settings.state_dir).save_or_warn(&record);
        }

        ui.show_run_summary(&RunSummary::from_result(&result, options.dry_run));
        show_failure_hint(ui, &result);

        Ok(if result.success() {
            CommandResult::success()
        } else {
            CommandResult::failure(result.exit_code())
        })
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let loaded = self.context.load_config()?;
        let config = &loaded.config;

        // Native manager output goes straight to the terminal while it runs.
        let echo = ui.output_mode().shows_command_output();
        let mut system = SystemStore::from_config(&config.system)?.echo(echo);
        let mut installer = PipInstaller::new(config.installer.python.clone()).echo(echo);

        self.run_with(config, &mut system, &mut installer, ui)
    }
}

fn manifest_digest(path: &Path) -> Option<String> {
    match Manifest::load(path) {
        Ok(manifest) => Some(manifest.digest().to_string()),
        Err(e) => {
            tracing::debug!("no manifest digest: {}", e);
            None
        }
    }
}

fn report(ui: &mut dyn UserInterface, event: RunProgress<'_>) {
    match event {
        RunProgress::StepStarting {
            name,
            description,
            index,
            total,
        } => ui.show_step(index, total, name, description),
        RunProgress::StepFinished { result } => report_result(ui, result),
        RunProgress::StepNotRun { name } => tracing::debug!("{} not run", name),
    }
}

fn report_result(ui: &mut dyn UserInterface, result: &StepResult) {
    let line = match &result.detail {
        Some(detail) => format!("{}: {}", result.name, detail),
        None => result.name.clone(),
    };
    match result.status {
        StepStatus::Completed | StepStatus::Unchanged => ui.success(&line),
        StepStatus::Warned => ui.warning(&line),
        StepStatus::Failed => ui.error(&line),
        StepStatus::Planned | StepStatus::NotRun => {}
    }
}

fn show_failure_hint(ui: &mut dyn UserInterface, result: &PipelineResult) {
    let hint = match &result.error {
        Some(ProvisionError::PackageManagerError { message, .. }) => {
            find_hint(message, OutputSource::PackageManager)
        }
        Some(ProvisionError::UpgradeError { message, .. })
        | Some(ProvisionError::DependencyResolutionError { message, .. }) => {
            find_hint(message, OutputSource::Installer)
        }
        Some(ProvisionError::PackageManagerUnavailable { .. }) => {
            Some("set system.manager in provision.yml")
        }
        _ => None,
    };
    if let Some(hint) = hint {
        ui.show_hint(hint);
    }
}
