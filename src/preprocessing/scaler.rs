use crate::artifacts::{Versioned, FORMAT_VERSION};
use crate::data::{Dataset, Record, Value};
use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Fitted standardization parameters, stored with the feature order they were fit on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    /// Artifact format version
    pub format_version: u32,

    /// Feature names in fit order
    pub features: Vec<String>,

    /// Mean per feature
    pub means: Vec<f64>,

    /// Population standard deviation per feature
    pub stds: Vec<f64>,

    /// Number of non-missing samples seen per feature
    pub n_samples: Vec<usize>,

    /// Fit timestamp
    pub fitted_at: chrono::DateTime<chrono::Utc>,
}

impl Versioned for ScalerState {
    fn format_version(&self) -> u32 {
        self.format_version
    }

    fn validate(&self) -> Result<()> {
        let n = self.features.len();
        if self.means.len() != n || self.stds.len() != n || self.n_samples.len() != n {
            return Err(PipelineError::Artifact(format!(
                "scaler has {} features but {} means, {} stds and {} sample counts",
                n,
                self.means.len(),
                self.stds.len(),
                self.n_samples.len()
            )));
        }
        Ok(())
    }
}

impl ScalerState {
    /// Divisor for a feature; a constant column scales by 1 so it maps to 0
    fn scale(&self, idx: usize) -> f64 {
        let std = self.stds[idx];
        if is_zero_variance(std, self.means[idx]) {
            1.0
        } else {
            std
        }
    }

    fn standardize(&self, idx: usize, value: f64) -> f64 {
        (value - self.means[idx]) / self.scale(idx)
    }

    /// Scale one record with the fitted parameters.
    ///
    /// `feature_names` must match the fit order exactly; every feature must be
    /// present in the record with a numeric value.
    pub fn transform(&self, record: &Record, feature_names: &[String]) -> Result<Vec<f64>> {
        if feature_names != self.features.as_slice() {
            return Err(PipelineError::Schema(format!(
                "feature order {:?} does not match scaler order {:?}",
                feature_names, self.features
            )));
        }

        self.features
            .iter()
            .enumerate()
            .map(|(idx, feature)| match record.get(feature) {
                Some(Value::Number(v)) => Ok(self.standardize(idx, *v)),
                Some(Value::Missing) | None => Err(PipelineError::Schema(format!(
                    "record is missing feature '{}'",
                    feature
                ))),
                Some(Value::Text(s)) => Err(PipelineError::Schema(format!(
                    "feature '{}' is not numeric: {:?}",
                    feature, s
                ))),
            })
            .collect()
    }
}

fn is_zero_variance(std: f64, mean: f64) -> bool {
    !std.is_finite() || std <= 10.0 * f64::EPSILON * mean.abs().max(1.0)
}

/// Standardizes a fixed feature set to zero mean and unit variance
#[derive(Debug, Clone, Default)]
pub struct StandardScaler;

impl StandardScaler {
    pub fn new() -> Self {
        Self
    }

    /// Fit per-feature mean/std over the dataset and replace each feature
    /// column with its standardized values. Missing cells are ignored while
    /// fitting and stay missing in the output.
    pub fn fit_transform(
        &self,
        dataset: &Dataset,
        feature_names: &[String],
    ) -> Result<(Dataset, ScalerState)> {
        if feature_names.is_empty() {
            return Err(PipelineError::Config("no usable features".to_string()));
        }

        let mut indices = Vec::with_capacity(feature_names.len());
        for feature in feature_names {
            let idx = dataset.column_index(feature).ok_or_else(|| {
                PipelineError::Config(format!(
                    "no usable features: '{}' is not a dataset column",
                    feature
                ))
            })?;
            if !dataset.is_numeric_column(idx) {
                return Err(PipelineError::Data(format!(
                    "feature '{}' contains non-numeric values",
                    feature
                )));
            }
            indices.push(idx);
        }

        let mut means = Vec::with_capacity(indices.len());
        let mut stds = Vec::with_capacity(indices.len());
        let mut n_samples = Vec::with_capacity(indices.len());

        for (feature, &idx) in feature_names.iter().zip(&indices) {
            let values: Array1<f64> = dataset
                .rows()
                .iter()
                .filter_map(|row| row[idx].as_f64())
                .collect();

            let mean = values.mean().ok_or_else(|| {
                PipelineError::Data(format!("feature '{}' has no values to fit", feature))
            })?;
            let std = values.std(0.0);

            if is_zero_variance(std, mean) {
                warn!(feature = %feature, "Zero-variance feature, scaled values will be 0");
            }

            means.push(mean);
            stds.push(std);
            n_samples.push(values.len());
        }

        let state = ScalerState {
            format_version: FORMAT_VERSION,
            features: feature_names.to_vec(),
            means,
            stds,
            n_samples,
            fitted_at: chrono::Utc::now(),
        };

        let mut scaled = dataset.clone();
        for (feature_idx, &column_idx) in indices.iter().enumerate() {
            scaled.map_column(column_idx, |value| match value {
                Value::Number(v) => Value::Number(state.standardize(feature_idx, *v)),
                other => other.clone(),
            });
        }

        info!(
            features = ?state.features,
            means = ?state.means,
            stds = ?state.stds,
            "Scaler fitted"
        );

        Ok((scaled, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn sample_dataset() -> Dataset {
        Dataset::from_rows(
            features(&["hour", "severity", "note"]),
            (0..10)
                .map(|i| {
                    vec![
                        Value::Number(i as f64 * 2.0),
                        Value::Number((i % 4) as f64),
                        Value::from("x"),
                    ]
                })
                .collect(),
        )
        .unwrap()
    }

    fn column(dataset: &Dataset, name: &str) -> Array1<f64> {
        dataset.column(name).unwrap().filter_map(Value::as_f64).collect()
    }

    #[test]
    fn test_scaled_columns_have_zero_mean_unit_std() {
        let dataset = sample_dataset();
        let (scaled, state) = StandardScaler::new()
            .fit_transform(&dataset, &features(&["hour", "severity"]))
            .unwrap();

        for name in ["hour", "severity"] {
            let values = column(&scaled, name);
            assert!(values.mean().unwrap().abs() < 1e-9);
            assert!((values.std(0.0) - 1.0).abs() < 1e-9);
        }
        assert_eq!(state.features, features(&["hour", "severity"]));
        assert_eq!(state.means[0], 9.0);
        assert_eq!(scaled.rows()[0][2], Value::from("x"));
    }

    #[test]
    fn test_zero_variance_feature_scales_to_zero() {
        let dataset = Dataset::from_rows(
            features(&["month"]),
            vec![vec![Value::Number(0.1)]; 5],
        )
        .unwrap();

        let (scaled, _) = StandardScaler::new()
            .fit_transform(&dataset, &features(&["month"]))
            .unwrap();

        assert!(column(&scaled, "month").iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_missing_values_ignored_and_kept() {
        let dataset = Dataset::from_rows(
            features(&["hour"]),
            vec![
                vec![Value::Number(1.0)],
                vec![Value::Missing],
                vec![Value::Number(3.0)],
            ],
        )
        .unwrap();

        let (scaled, state) = StandardScaler::new()
            .fit_transform(&dataset, &features(&["hour"]))
            .unwrap();

        assert_eq!(state.means, vec![2.0]);
        assert_eq!(state.n_samples, vec![2]);
        assert!(scaled.rows()[1][0].is_missing());
    }

    #[test]
    fn test_no_usable_features() {
        let dataset = sample_dataset();
        let scaler = StandardScaler::new();

        assert!(matches!(
            scaler.fit_transform(&dataset, &[]),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            scaler.fit_transform(&dataset, &features(&["hour", "month"])),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            scaler.fit_transform(&dataset, &features(&["note"])),
            Err(PipelineError::Data(_))
        ));
    }

    #[test]
    fn test_transform_matches_batch_output() {
        let dataset = sample_dataset();
        let names = features(&["hour", "severity"]);
        let (scaled, state) = StandardScaler::new().fit_transform(&dataset, &names).unwrap();

        for i in 0..dataset.n_rows() {
            let record = dataset.record(i).unwrap();
            let vector = state.transform(&record, &names).unwrap();
            let expected = [
                scaled.rows()[i][0].as_f64().unwrap(),
                scaled.rows()[i][1].as_f64().unwrap(),
            ];
            assert!((vector[0] - expected[0]).abs() < 1e-12);
            assert!((vector[1] - expected[1]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_transform_schema_errors() {
        let dataset = sample_dataset();
        let names = features(&["hour", "severity"]);
        let (_, state) = StandardScaler::new().fit_transform(&dataset, &names).unwrap();

        let partial = Record::new().with("hour", 4.0);
        assert!(matches!(
            state.transform(&partial, &names),
            Err(PipelineError::Schema(_))
        ));

        let full = Record::new().with("hour", 4.0).with("severity", 1.0);
        assert!(matches!(
            state.transform(&full, &features(&["severity", "hour"])),
            Err(PipelineError::Schema(_))
        ));
        assert!(state.transform(&full, &names).is_ok());
    }

    #[test]
    fn test_validate_rejects_short_parameter_vectors() {
        let dataset = sample_dataset();
        let names = features(&["hour", "severity"]);
        let (_, mut state) = StandardScaler::new().fit_transform(&dataset, &names).unwrap();
        assert!(state.validate().is_ok());

        state.stds.truncate(1);
        assert!(matches!(state.validate(), Err(PipelineError::Artifact(_))));
    }
}
