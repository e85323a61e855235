//! Common test utilities for pipeline and API testing
//!
//! Builds synthetic accident CSVs and trained artifacts in temporary
//! directories.

#![allow(dead_code)]

use accident_clustering::ml::TrainerConfig;
use accident_clustering::pipeline;
use accident_clustering::tracking::NoopTracker;
use std::fs;
use std::path::{Path, PathBuf};

pub const HEADER: &str = "timestamp,severity,latitude,longitude";

/// Number of unique rows with a complete location
pub const UNIQUE_ROWS: usize = 95;

/// Exact copies appended after the unique rows
pub const DUPLICATE_ROWS: usize = 5;

/// Rows appended with an empty latitude
pub const MISSING_LATITUDE_ROWS: usize = 3;

fn row(i: usize) -> String {
    let month = 1 + (i * 7) % 12;
    let day = 1 + (i * 11) % 28;
    let hour = (i * 5 + i / 7) % 24;
    let minute = (i * 13) % 60;
    let severity = 1 + (i * 3) % 4;

    format!(
        "2023-{:02}-{:02} {:02}:{:02}:00,{},{:.4},{:.4}",
        month,
        day,
        hour,
        minute,
        severity,
        34.0 + i as f64 * 0.0137,
        -118.0 - i as f64 * 0.0091
    )
}

/// Synthetic accident CSV: unique rows, then duplicates, then rows missing latitude
pub fn accident_csv() -> String {
    let mut lines = vec![HEADER.to_string()];
    lines.extend((0..UNIQUE_ROWS).map(row));
    lines.extend((0..DUPLICATE_ROWS).map(|i| row(i * 10)));
    lines.extend((0..MISSING_LATITUDE_ROWS).map(|i| {
        format!("2023-06-0{} 12:00:00,2,,-118.5", i + 1)
    }));
    lines.join("\n") + "\n"
}

pub fn write_raw_csv(dir: &Path) -> PathBuf {
    let path = dir.join("raw/accidents.csv");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, accident_csv()).unwrap();
    path
}

/// Paths of a fully trained model in `dir`
pub struct TrainedArtifacts {
    pub processed: PathBuf,
    pub model: PathBuf,
    pub scaler: PathBuf,
}

pub fn train_artifacts(dir: &Path, k: usize) -> TrainedArtifacts {
    let raw = write_raw_csv(dir);
    let artifacts = TrainedArtifacts {
        processed: dir.join("processed/accidents_processed.csv"),
        model: dir.join("models/best_model.bin"),
        scaler: dir.join("models/scaler.bin"),
    };

    pipeline::preprocess(&raw, &artifacts.processed, &artifacts.scaler).unwrap();
    pipeline::train(
        &artifacts.processed,
        k,
        &artifacts.model,
        &TrainerConfig::default(),
        &mut NoopTracker,
    )
    .unwrap();

    artifacts
}
