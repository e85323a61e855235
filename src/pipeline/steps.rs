use crate::artifacts::{encode_artifact, save_artifact, stage};
use crate::data::{read_csv, to_csv_bytes};
use crate::error::{PipelineError, Result};
use crate::ml::{ModelBundle, Trainer, TrainerConfig, TrainingOutcome};
use crate::preprocessing::{available_features, Cleaner, CleaningStats, FeatureEngineer, StandardScaler};
use crate::tracking::ExperimentTracker;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

/// What the preprocess step produced
#[derive(Debug, Clone)]
pub struct PreprocessSummary {
    pub cleaning: CleaningStats,
    pub features: Vec<String>,
    pub rows: usize,
}

/// Clean, engineer and scale a raw CSV.
///
/// Both outputs are staged before either is renamed into place, and the
/// scaler is committed first so a scaled CSV never appears without it.
pub fn preprocess(input: &Path, output: &Path, scaler_path: &Path) -> Result<PreprocessSummary> {
    info!(input = %input.display(), "Preprocessing started");

    let raw = read_csv(input)?;
    let (cleaned, cleaning) = Cleaner::default().clean_with_stats(&raw)?;
    let engineered = FeatureEngineer::new().engineer(&cleaned)?;

    let features = available_features(&engineered);
    info!(features = ?features, "Features selected");

    let (scaled, scaler) = StandardScaler::new().fit_transform(&engineered, &features)?;

    let staged_scaler = stage(scaler_path, &encode_artifact(&scaler)?)?;
    let staged_csv = stage(output, &to_csv_bytes(&scaled)?)?;
    staged_scaler.commit()?;
    staged_csv.commit()?;

    info!(
        output = %output.display(),
        scaler = %scaler_path.display(),
        rows = scaled.n_rows(),
        "Preprocessing completed"
    );

    Ok(PreprocessSummary {
        cleaning,
        features,
        rows: scaled.n_rows(),
    })
}

/// Train on a processed CSV and persist the winning bundle.
///
/// Parameters, scores and artifacts are logged to `tracker`; closing the run
/// is left to the caller so retried attempts land in the same run.
pub fn train(
    input: &Path,
    k: usize,
    output: &Path,
    config: &TrainerConfig,
    tracker: &mut dyn ExperimentTracker,
) -> Result<TrainingOutcome> {
    info!(input = %input.display(), k, seed = config.seed, "Training started");

    let data_hash = file_sha256(input)?;
    let dataset = read_csv(input)?;
    let features = available_features(&dataset);

    tracker.log_param("k", &k.to_string())?;
    tracker.log_param("seed", &config.seed.to_string())?;
    tracker.log_param("data_sha256", &data_hash)?;
    tracker.log_param("features", &features.join(","))?;

    let outcome = Trainer::new(config.clone()).train(&dataset, &features, k)?;

    save_artifact(output, &outcome.bundle)?;

    let candidate_dir = tempfile::tempdir()?;
    for candidate in &outcome.candidates {
        let tag = candidate.model_type().tag();
        let bundle = ModelBundle::new(candidate.model.clone(), features.clone(), k, candidate.score);
        let path = candidate_dir.path().join(format!("{}_model.bin", tag));

        save_artifact(&path, &bundle)?;
        tracker.log_metric(metric_name(tag), candidate.score)?;
        tracker.log_artifact(&path, &format!("{}_model", tag))?;
    }

    tracker.log_metric("best_silhouette", outcome.bundle.score)?;
    tracker.log_param("best_model_type", outcome.bundle.model_type.tag())?;
    tracker.log_artifact(output, "best_model")?;

    info!(
        output = %output.display(),
        model_type = outcome.bundle.model_type.tag(),
        silhouette = outcome.bundle.score,
        "Training completed"
    );

    Ok(outcome)
}

fn metric_name(tag: &str) -> &'static str {
    match tag {
        "kmeans" => "silhouette_km",
        _ => "silhouette_gmm",
    }
}

/// Hex SHA-256 digest of a file's contents
pub fn file_sha256(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| {
        PipelineError::Data(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}
