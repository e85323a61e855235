use crate::error::Result;
use crate::ml::{TrainerConfig, TrainingOutcome};
use crate::pipeline::steps::{preprocess, train, PreprocessSummary};
use crate::tracking::{ExperimentTracker, RunStatus};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Paths and policy for one preprocess-then-train run
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub raw_path: PathBuf,
    pub processed_path: PathBuf,
    pub scaler_path: PathBuf,
    pub model_path: PathBuf,
    pub k: usize,
    pub trainer: TrainerConfig,

    /// Extra attempts per step after the first failure
    pub retries: u32,

    pub retry_delay: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("data/raw/accidents.csv"),
            processed_path: PathBuf::from("data/processed/accidents_processed.csv"),
            scaler_path: PathBuf::from("models/scaler.bin"),
            model_path: PathBuf::from("models/best_model.bin"),
            k: 5,
            trainer: TrainerConfig::default(),
            retries: 1,
            retry_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlowSummary {
    pub preprocess: PreprocessSummary,
    pub training: TrainingOutcome,
}

/// Run preprocess then train; a step that fails after all retries halts the flow
pub fn run_flow(config: &FlowConfig, tracker: &mut dyn ExperimentTracker) -> Result<FlowSummary> {
    info!(k = config.k, retries = config.retries, "Flow started");

    let preprocess_summary = with_retries("preprocess", config.retries, config.retry_delay, || {
        preprocess(&config.raw_path, &config.processed_path, &config.scaler_path)
    });
    let preprocess_summary = match preprocess_summary {
        Ok(summary) => summary,
        Err(e) => {
            tracker.finish(RunStatus::Failed)?;
            return Err(e);
        }
    };

    let training = with_retries("train", config.retries, config.retry_delay, || {
        train(
            &config.processed_path,
            config.k,
            &config.model_path,
            &config.trainer,
            &mut *tracker,
        )
    });

    match training {
        Ok(training) => {
            tracker.finish(RunStatus::Finished)?;
            info!(model_type = training.bundle.model_type.tag(), "Flow completed");
            Ok(FlowSummary {
                preprocess: preprocess_summary,
                training,
            })
        }
        Err(e) => {
            tracker.finish(RunStatus::Failed)?;
            Err(e)
        }
    }
}

fn with_retries<T, F>(step: &str, retries: u32, delay: Duration, mut f: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = retries + 1;
    let mut attempt = 0;

    loop {
        attempt += 1;
        info!(step, attempt, max_attempts, "Executing step attempt");

        match f() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                warn!(step, attempt, error = %e, "Step failed, retrying");
                std::thread::sleep(delay);
            }
            Err(e) => {
                error!(step, attempts = attempt, error = %e, "Step failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::tracking::{FileTracker, NoopTracker};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_with_retries_recovers() {
        let mut calls = 0;
        let result = with_retries("flaky", 2, Duration::ZERO, || {
            calls += 1;
            if calls < 3 {
                Err(PipelineError::Data("not yet".to_string()))
            } else {
                Ok(calls)
            }
        });

        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_with_retries_gives_up() {
        let mut calls = 0;
        let result: Result<()> = with_retries("broken", 1, Duration::ZERO, || {
            calls += 1;
            Err(PipelineError::Data("always".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_flow_halts_when_preprocess_fails() {
        let dir = tempdir().unwrap();
        let config = FlowConfig {
            raw_path: dir.path().join("absent.csv"),
            processed_path: dir.path().join("processed.csv"),
            scaler_path: dir.path().join("scaler.bin"),
            model_path: dir.path().join("model.bin"),
            retries: 0,
            retry_delay: Duration::ZERO,
            ..FlowConfig::default()
        };

        let mut tracker = FileTracker::start(dir.path().join("runs"), "flow").unwrap();
        assert!(run_flow(&config, &mut tracker).is_err());
        assert!(!config.model_path.exists());

        let record = FileTracker::load_record(tracker.run_dir()).unwrap();
        assert_eq!(record.status, RunStatus::Failed);
    }

    #[test]
    fn test_flow_runs_both_steps() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let mut csv = String::from("timestamp,severity,latitude,longitude\n");
        for i in 0..30 {
            csv.push_str(&format!(
                "2024-0{}-1{} {:02}:00:00,{},{},{}\n",
                1 + i % 9,
                i % 10,
                (i * 5) % 24,
                1 + i % 3,
                51.0 + i as f64 * 0.001,
                0.1
            ));
        }
        fs::write(&raw, csv).unwrap();

        let config = FlowConfig {
            raw_path: raw,
            processed_path: dir.path().join("processed.csv"),
            scaler_path: dir.path().join("scaler.bin"),
            model_path: dir.path().join("model.bin"),
            k: 3,
            retry_delay: Duration::ZERO,
            ..FlowConfig::default()
        };

        let summary = run_flow(&config, &mut NoopTracker).unwrap();
        assert_eq!(summary.preprocess.rows, 30);
        assert_eq!(summary.training.bundle.k, 3);
        assert!(config.model_path.exists());
    }
}
