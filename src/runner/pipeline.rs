//! Fail-fast execution of the provisioning steps.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::manifest::Version;
use crate::steps::{
    Host, InstallDependencies, InstallSystemPackages, Step, StepResult, StepStatus,
    UpgradeInstaller, VerifyTools,
};

/// Progress events emitted during a run.
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// A step is about to start.
    StepStarting {
        name: &'a str,
        description: &'a str,
        index: usize,
        total: usize,
    },
    /// A step finished (including failures and dry-run plans).
    StepFinished { result: &'a StepResult },
    /// A step was not run because an earlier step failed.
    StepNotRun { name: &'a str },
}

/// Options for a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Print the plan instead of touching the host.
    pub dry_run: bool,
}

/// Outcome of a run.
#[derive(Debug)]
pub struct PipelineResult {
    /// One entry per step, in pipeline order.
    pub steps: Vec<StepResult>,
    /// Name of the step that failed (its preflight or its run).
    pub failed_step: Option<String>,
    /// The error that stopped the run.
    pub error: Option<ProvisionError>,
    /// Total duration.
    pub duration: Duration,
}

impl PipelineResult {
    /// Whether every step succeeded.
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        self.error.as_ref().map_or(0, ProvisionError::exit_code)
    }

    /// Result for a named step.
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// The ordered provisioning steps.
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    /// Build a pipeline from explicit steps.
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    /// The standard pipeline for a configuration.
    ///
    /// Order is fixed: system packages, installer upgrade, dependencies,
    /// tool verification. The upgrade step is left out when
    /// `installer.upgrade` is false or `skip_upgrade` is set.
    pub fn from_config(
        config: &ProvisionConfig,
        project_root: &Path,
        skip_upgrade: bool,
    ) -> Result<Self> {
        let mut steps: Vec<Box<dyn Step>> = Vec::new();

        steps.push(Box::new(InstallSystemPackages::new(
            config.system.packages.iter().cloned(),
        )));

        if config.installer.upgrade && !skip_upgrade {
            let min_version = config
                .installer
                .min_version
                .as_deref()
                .map(str::parse::<Version>)
                .transpose()
                .map_err(|message| ProvisionError::ConfigValidationError {
                    message: format!("installer.min_version: {}", message),
                })?;
            steps.push(Box::new(UpgradeInstaller::new(
                config.installer.upgrade_policy,
                min_version,
            )));
        }

        steps.push(Box::new(InstallDependencies::new(
            project_root.join(&config.dependencies.manifest),
        )));

        if !config.verify.tools.is_empty() {
            steps.push(Box::new(VerifyTools::new(config.verify.tools.iter().cloned())));
        }

        Ok(Self::new(steps))
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step's preflight check, stopping at the first failure.
    pub fn preflight(&self) -> std::result::Result<(), (String, ProvisionError)> {
        for step in &self.steps {
            if let Err(e) = step.preflight() {
                return Err((step.name().to_string(), e));
            }
        }
        Ok(())
    }

    /// Run the pipeline without progress reporting.
    pub fn run(&self, host: &mut Host<'_>, options: &RunOptions) -> PipelineResult {
        self.run_with_progress(host, options, |_| {})
    }

    /// Run the pipeline, reporting progress.
    ///
    /// Preflight checks run first; a preflight failure leaves every step
    /// not run. After that steps run in order and the first failure stops
    /// the run. Nothing is rolled back.
    pub fn run_with_progress(
        &self,
        host: &mut Host<'_>,
        options: &RunOptions,
        mut on_progress: impl FnMut(RunProgress<'_>),
    ) -> PipelineResult {
        let start = Instant::now();
        let total = self.steps.len();
        let mut results = Vec::with_capacity(total);
        let mut failed_step = None;
        let mut error = None;

        if let Err((name, e)) = self.preflight() {
            warn!("preflight for '{}' failed: {}", name, e);
            for step in &self.steps {
                on_progress(RunProgress::StepNotRun { name: step.name() });
                results.push(StepResult::not_run(step.name()));
            }
            return PipelineResult {
                steps: results,
                failed_step: Some(name),
                error: Some(e),
                duration: start.elapsed(),
            };
        }

        for (index, step) in self.steps.iter().enumerate() {
            let name = step.name();

            if error.is_some() {
                on_progress(RunProgress::StepNotRun { name });
                results.push(StepResult::not_run(name));
                continue;
            }

            let description = step.description();
            on_progress(RunProgress::StepStarting {
                name,
                description: &description,
                index,
                total,
            });

            let step_start = Instant::now();
            let outcome = if options.dry_run {
                step.plan(host).map(|commands| StepResult::planned(name, &commands))
            } else {
                step.run(host)
                    .map(|outcome| StepResult::from_outcome(name, outcome, step_start.elapsed()))
            };

            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    warn!("step '{}' failed: {}", name, e);
                    let result = StepResult::failure(name, step_start.elapsed(), e.to_string());
                    failed_step = Some(name.to_string());
                    error = Some(e);
                    result
                }
            };

            on_progress(RunProgress::StepFinished { result: &result });
            results.push(result);
        }

        debug_assert!(results
            .iter()
            .skip_while(|r| r.status != StepStatus::Failed)
            .skip(1)
            .all(|r| r.status == StepStatus::NotRun));

        PipelineResult {
            steps: results,
            failed_step,
            error,
            duration: start.elapsed(),
        }
    }
}
