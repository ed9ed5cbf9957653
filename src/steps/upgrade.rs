use super::{CheckItem, Host, Step, StepOutcome};
use crate::config::UpgradePolicy;
use crate::error::{ProvisionError, Result};
use crate::manifest::Version;

/// Upgrade the language package installer.
///
/// Under [`UpgradePolicy::Lenient`] a failed upgrade is tolerated when the
/// installer already present is recent enough: at least `min_version`, or
/// any detectable version when no minimum is set.
#[derive(Debug, Clone)]
pub struct UpgradeInstaller {
    policy: UpgradePolicy,
    min_version: Option<Version>,
}

impl UpgradeInstaller {
    pub fn new(policy: UpgradePolicy, min_version: Option<Version>) -> Self {
        Self {
            policy,
            min_version,
        }
    }

    /// Whether an installer at `version` is good enough to continue with.
    pub fn is_adequate(&self, version: Option<&Version>) -> bool {
        match (version, &self.min_version) {
            (Some(v), Some(min)) => v >= min,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

impl Step for UpgradeInstaller {
    fn name(&self) -> &str {
        "upgrade-installer"
    }

    fn description(&self) -> String {
        "Upgrading the package installer".to_string()
    }

    fn plan(&self, host: &Host<'_>) -> Result<Vec<String>> {
        Ok(vec![host.installer.upgrade_command().to_string()])
    }

    fn run(&self, host: &mut Host<'_>) -> Result<StepOutcome> {
        let name = host.installer.name().to_string();
        match host.installer.upgrade_self() {
            Ok(()) => {
                let version = host.installer.version()?;
                Ok(StepOutcome::completed(match version {
                    Some(v) => format!("{} {}", name, v),
                    None => format!("{} upgraded", name),
                }))
            }
            Err(err @ ProvisionError::UpgradeError { .. })
                if self.policy == UpgradePolicy::Lenient =>
            {
                let current = host.installer.version().unwrap_or_else(|e| {
                    tracing::debug!("could not read {} version: {}", name, e);
                    None
                });
                if !self.is_adequate(current.as_ref()) {
                    return Err(err);
                }
                let current = current.map(|v| v.to_string()).unwrap_or_default();
                tracing::warn!("{}; continuing with {} {}", err, name, current);
                Ok(StepOutcome::warned(format!(
                    "upgrade failed, continuing with {} {}",
                    name, current
                )))
            }
            Err(err) => Err(err),
        }
    }

    fn check(&self, host: &Host<'_>) -> Result<Vec<CheckItem>> {
        let name = host.installer.name().to_string();
        let version = host.installer.version()?;
        let detail = version.as_ref().map(|v| v.to_string());
        Ok(vec![if self.is_adequate(version.as_ref()) {
            CheckItem::ok(name, detail)
        } else {
            CheckItem::missing(name, detail.or_else(|| Some("not available".to_string())))
        }])
    }
}
