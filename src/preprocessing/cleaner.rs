use crate::data::{Dataset, Value};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Cleaner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanerConfig {
    /// Latitude column name
    pub latitude_column: String,

    /// Longitude column name
    pub longitude_column: String,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            latitude_column: "latitude".to_string(),
            longitude_column: "longitude".to_string(),
        }
    }
}

/// Row counts observed while cleaning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub input_rows: usize,
    pub duplicates_removed: usize,
    pub missing_location_removed: usize,
    pub values_imputed: usize,
    pub output_rows: usize,
}

/// Deduplicates rows, drops rows without a location and imputes numeric gaps
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    config: CleanerConfig,
}

impl Cleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    /// Clean a dataset
    pub fn clean(&self, dataset: &Dataset) -> Result<Dataset> {
        self.clean_with_stats(dataset).map(|(cleaned, _)| cleaned)
    }

    /// Clean a dataset and report what was removed or filled
    pub fn clean_with_stats(&self, dataset: &Dataset) -> Result<(Dataset, CleaningStats)> {
        let mut cleaned = dataset.clone();
        let mut stats = CleaningStats {
            input_rows: dataset.n_rows(),
            ..Default::default()
        };

        stats.duplicates_removed = drop_duplicates(&mut cleaned);
        stats.missing_location_removed = self.drop_missing_location(&mut cleaned);

        if cleaned.is_empty() {
            return Err(PipelineError::Data(format!(
                "dataset is empty after cleaning ({} input rows)",
                stats.input_rows
            )));
        }

        stats.values_imputed = impute_medians(&mut cleaned);

        // Imputation can make two rows identical; a second pass keeps
        // clean(clean(x)) == clean(x).
        stats.duplicates_removed += drop_duplicates(&mut cleaned);
        stats.output_rows = cleaned.n_rows();

        info!(
            input_rows = stats.input_rows,
            duplicates_removed = stats.duplicates_removed,
            missing_location_removed = stats.missing_location_removed,
            values_imputed = stats.values_imputed,
            output_rows = stats.output_rows,
            "Cleaning complete"
        );

        Ok((cleaned, stats))
    }

    /// Drop rows missing either coordinate; skipped unless both columns exist
    fn drop_missing_location(&self, dataset: &mut Dataset) -> usize {
        let (lat, lon) = match (
            dataset.column_index(&self.config.latitude_column),
            dataset.column_index(&self.config.longitude_column),
        ) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                debug!("Location columns not both present, skipping spatial filter");
                return 0;
            }
        };

        let before = dataset.n_rows();
        dataset.retain_rows(|row| !row[lat].is_missing() && !row[lon].is_missing());
        before - dataset.n_rows()
    }
}

/// Remove exact duplicate rows, keeping the first occurrence
fn drop_duplicates(dataset: &mut Dataset) -> usize {
    let before = dataset.n_rows();
    let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(before);
    dataset.retain_rows(|row| seen.insert(row.clone()));
    before - dataset.n_rows()
}

/// Fill missing cells of every numeric column with the column median
fn impute_medians(dataset: &mut Dataset) -> usize {
    let mut imputed = 0;

    for idx in 0..dataset.columns().len() {
        if !dataset.is_numeric_column(idx) {
            continue;
        }

        let missing = dataset.rows().iter().filter(|row| row[idx].is_missing()).count();
        if missing == 0 {
            continue;
        }

        let values: Vec<f64> = dataset.rows().iter().filter_map(|row| row[idx].as_f64()).collect();
        let Some(fill) = median(values) else {
            warn!(
                column = %dataset.columns()[idx],
                "Column has no values, leaving missing cells unfilled"
            );
            continue;
        };

        dataset.map_column(idx, |value| match value {
            Value::Missing => Value::Number(fill),
            other => other.clone(),
        });
        imputed += missing;
    }

    imputed
}

/// Median of the values; the mean of the two middle values for even counts
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(|a, b| a.total_cmp(b));
    let count = values.len();

    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };

    Some(median)
}
