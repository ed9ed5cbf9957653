//! Run records.
//!
//! A [`RunRecord`] describes one provisioning run: when it started and
//! finished, which step failed, what each step did, and a fingerprint of
//! the manifest it installed from. [`RunRecordBuilder`] assembles one from
//! a pipeline result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runner::PipelineResult;
use crate::steps::{StepResult, StepStatus};

/// Record of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name.
    pub name: String,

    /// Final status.
    pub status: StepStatus,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Summary or error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&StepResult> for StepRecord {
    fn from(result: &StepResult) -> Self {
        Self {
            name: result.name.clone(),
            status: result.status,
            duration_ms: result.duration.as_millis() as u64,
            detail: result.detail.clone(),
        }
    }
}

/// A record of a single provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run finished.
    pub finished_at: DateTime<Utc>,

    /// Whether every step succeeded.
    pub success: bool,

    /// Name of the step that stopped the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,

    /// One-line error summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Exit code the run ended with.
    pub exit_code: i32,

    /// Per-step results in pipeline order.
    pub steps: Vec<StepRecord>,

    /// SHA-256 of the manifest content, when it could be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_sha256: Option<String>,
}

impl RunRecord {
    /// Total run time in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Record for a named step.
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Names of steps with the given status.
    pub fn steps_with_status(&self, status: StepStatus) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// Helper for building a run record.
pub struct RunRecordBuilder {
    started_at: DateTime<Utc>,
    manifest_sha256: Option<String>,
}

impl RunRecordBuilder {
    /// Start a new run record.
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            manifest_sha256: None,
        }
    }

    /// Attach the manifest fingerprint.
    pub fn manifest_digest(mut self, digest: Option<String>) -> Self {
        self.manifest_sha256 = digest;
        self
    }

    /// Finish from a pipeline result.
    pub fn finish(self, result: &PipelineResult) -> RunRecord {
        RunRecord {
            started_at: self.started_at,
            finished_at: Utc::now(),
            success: result.success(),
            failed_step: result.failed_step.clone(),
            error: result.error.as_ref().map(ToString::to_string),
            exit_code: result.exit_code(),
            steps: result.steps.iter().map(StepRecord::from).collect(),
            manifest_sha256: self.manifest_sha256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use std::time::Duration;

    fn failed_result() -> PipelineResult {
        PipelineResult {
            steps: vec![
                StepResult::failure(
                    "system-packages",
                    Duration::from_millis(1200),
                    "network unavailable".to_string(),
                ),
                StepResult::not_run("dependencies"),
            ],
            failed_step: Some("system-packages".to_string()),
            error: Some(ProvisionError::ToolMissing {
                tool: "tesseract".to_string(),
                hint: String::new(),
            }),
            duration: Duration::from_millis(1200),
        }
    }

    #[test]
    fn builder_captures_failure() {
        let record = RunRecordBuilder::start()
            .manifest_digest(Some("abc".to_string()))
            .finish(&failed_result());

        assert!(!record.success);
        assert_eq!(record.failed_step.as_deref(), Some("system-packages"));
        assert_eq!(record.exit_code, 1);
        assert_eq!(record.steps.len(), 2);
        assert_eq!(record.steps[0].duration_ms, 1200);
        assert_eq!(record.steps_with_status(StepStatus::NotRun), vec!["dependencies"]);
        assert_eq!(record.manifest_sha256.as_deref(), Some("abc"));
        assert!(record.duration_ms() >= 0);
    }

    #[test]
    fn record_json_shape() {
        let record = RunRecordBuilder::start().finish(&failed_result());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["steps"][0]["status"], "failed");
        assert_eq!(json["steps"][1]["status"], "not_run");
        assert!(json.get("manifest_sha256").is_none());
        assert!(json["started_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn record_round_trips() {
        let record = RunRecordBuilder::start().finish(&failed_result());
        let json = serde_json::to_string(&record).unwrap();
        let parsed: RunRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
