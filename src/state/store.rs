//! Persistent run state.
//!
//! The last run record lives at `<project>/<state_dir>/last-run.json`.

use std::fs;
use std::path::{Path, PathBuf};

use super::RunRecord;
use crate::error::{ProvisionError, Result};

/// File name of the last run record.
pub const LAST_RUN_FILE: &str = "last-run.json";

/// Reads and writes run records for a project.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// State under `project_root/state_dir`.
    pub fn new(project_root: &Path, state_dir: &Path) -> Self {
        Self {
            dir: project_root.join(state_dir),
        }
    }

    /// The state directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the last run record.
    pub fn last_run_path(&self) -> PathBuf {
        self.dir.join(LAST_RUN_FILE)
    }

    /// Load the last run record, `None` when there isn't one yet.
    pub fn load_last_run(&self) -> Result<Option<RunRecord>> {
        let path = self.last_run_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let record = serde_json::from_str(&content).map_err(|e| {
            ProvisionError::Other(anyhow::anyhow!(
                "failed to parse run record {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Some(record))
    }

    /// Save the last run record using an atomic write.
    pub fn save_last_run(&self, record: &RunRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.last_run_path();
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| ProvisionError::Other(anyhow::anyhow!("serializing run record: {}", e)))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &path)?;

        tracing::debug!("saved run record to {}", path.display());
        Ok(())
    }

    /// Save a record, logging instead of failing.
    pub fn save_or_warn(&self, record: &RunRecord) {
        if let Err(e) = self.save_last_run(record) {
            tracing::warn!(
                "could not write run record to {}: {}",
                self.last_run_path().display(),
                e
            );
        }
    }
}
