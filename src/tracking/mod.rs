//! Experiment tracking
//!
//! A training run records its parameters, metrics and produced artifacts
//! through an [`ExperimentTracker`]. [`FileTracker`] keeps one directory per
//! run on local disk; [`NoopTracker`] discards everything.

use crate::artifacts::write_atomic;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Name of the per-run summary file
pub const RUN_FILE: &str = "run.json";

/// Sink for run parameters, metrics and artifacts
pub trait ExperimentTracker: Send {
    fn log_param(&mut self, key: &str, value: &str) -> Result<()>;

    fn log_metric(&mut self, key: &str, value: f64) -> Result<()>;

    /// Record a file produced by the run under `artifact_path`
    fn log_artifact(&mut self, local_path: &Path, artifact_path: &str) -> Result<()>;

    /// Close the run with a final status
    fn finish(&mut self, status: RunStatus) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// Persisted summary of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment: String,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Tracker that writes `<root>/<experiment>/<run-id>/run.json` and copies
/// artifacts below `artifacts/` in the run directory
#[derive(Debug)]
pub struct FileTracker {
    run_dir: PathBuf,
    record: RunRecord,
}

impl FileTracker {
    /// Start a new run
    pub fn start(root: impl AsRef<Path>, experiment: &str) -> Result<Self> {
        if experiment.is_empty() || experiment.contains(['/', '\\']) {
            return Err(PipelineError::Config(format!(
                "invalid experiment name {:?}",
                experiment
            )));
        }

        let run_id = Uuid::new_v4().to_string();
        let run_dir = root.as_ref().join(experiment).join(&run_id);
        fs::create_dir_all(&run_dir)?;

        let tracker = Self {
            run_dir,
            record: RunRecord {
                run_id,
                experiment: experiment.to_string(),
                status: RunStatus::Running,
                params: BTreeMap::new(),
                metrics: BTreeMap::new(),
                artifacts: Vec::new(),
                started_at: Utc::now(),
                finished_at: None,
            },
        };
        tracker.flush()?;

        info!(
            experiment = %experiment,
            run_id = %tracker.record.run_id,
            "Tracking run started"
        );
        Ok(tracker)
    }

    pub fn run_id(&self) -> &str {
        &self.record.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Read back a run summary
    pub fn load_record(run_dir: &Path) -> Result<RunRecord> {
        let bytes = fs::read(run_dir.join(RUN_FILE))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.record)?;
        write_atomic(&self.run_dir.join(RUN_FILE), &json)
    }
}

impl ExperimentTracker for FileTracker {
    fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        debug!(key, value, "Logging param");
        self.record.params.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        debug!(key, value, "Logging metric");
        self.record.metrics.insert(key.to_string(), value);
        self.flush()
    }

    fn log_artifact(&mut self, local_path: &Path, artifact_path: &str) -> Result<()> {
        let file_name = local_path.file_name().ok_or_else(|| {
            PipelineError::Artifact(format!("{} is not a file", local_path.display()))
        })?;

        let dest_dir = self.run_dir.join("artifacts").join(artifact_path);
        fs::create_dir_all(&dest_dir)?;
        fs::copy(local_path, dest_dir.join(file_name))?;

        let entry = format!("{}/{}", artifact_path, file_name.to_string_lossy());
        debug!(artifact = %entry, "Logging artifact");
        if !self.record.artifacts.contains(&entry) {
            self.record.artifacts.push(entry);
        }
        self.flush()
    }

    fn finish(&mut self, status: RunStatus) -> Result<()> {
        self.record.status = status;
        self.record.finished_at = Some(Utc::now());
        self.flush()?;

        info!(run_id = %self.record.run_id, status = ?status, "Tracking run finished");
        Ok(())
    }
}

/// Tracker that records nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl ExperimentTracker for NoopTracker {
    fn log_param(&mut self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    fn log_metric(&mut self, _key: &str, _value: f64) -> Result<()> {
        Ok(())
    }

    fn log_artifact(&mut self, _local_path: &Path, _artifact_path: &str) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self, _status: RunStatus) -> Result<()> {
        Ok(())
    }
}
