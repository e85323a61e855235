use crate::data::{Dataset, Value};
use crate::error::{PipelineError, Result};
use crate::ml::clustering::{ClusteringVariant, GaussianMixtureVariant, KMeansVariant};
use crate::ml::models::{ClusterModel, ModelBundle, ModelType, TrainerConfig};
use ndarray::{Array1, Array2};
use std::collections::HashSet;
use tracing::{info, warn};

/// One fitted variant with its labels and quality score
#[derive(Debug, Clone)]
pub struct FittedCandidate {
    pub model: ClusterModel,
    pub labels: Array1<usize>,
    pub score: f64,
}

impl FittedCandidate {
    pub fn model_type(&self) -> ModelType {
        self.model.model_type()
    }
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Winning model bundle
    pub bundle: ModelBundle,

    /// Every fitted variant in evaluation order
    pub candidates: Vec<FittedCandidate>,

    /// Rows used for fitting
    pub n_samples: usize,

    /// Rows skipped because a feature value was missing
    pub n_excluded: usize,
}

impl TrainingOutcome {
    /// Score of a given variant
    pub fn score_of(&self, model_type: ModelType) -> Option<f64> {
        self.candidates
            .iter()
            .find(|c| c.model_type() == model_type)
            .map(|c| c.score)
    }
}

/// Fits every clustering variant, scores each by silhouette and keeps the best
pub struct Trainer {
    variants: Vec<Box<dyn ClusteringVariant>>,
}

impl Trainer {
    /// Trainer over k-means then Gaussian mixture, both seeded from the config
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            variants: vec![
                Box::new(KMeansVariant::new(config.seed)),
                Box::new(GaussianMixtureVariant::new(config.seed)),
            ],
        }
    }

    /// Trainer over a custom variant list; earlier variants win ties
    pub fn with_variants(variants: Vec<Box<dyn ClusteringVariant>>) -> Self {
        Self { variants }
    }

    /// Train every variant on the scaled dataset and select the best
    pub fn train(
        &self,
        dataset: &Dataset,
        feature_names: &[String],
        k: usize,
    ) -> Result<TrainingOutcome> {
        if k == 0 {
            return Err(PipelineError::Config("k must be at least 1".to_string()));
        }
        if self.variants.is_empty() {
            return Err(PipelineError::Config("no clustering variants configured".to_string()));
        }

        let (features, n_excluded) = feature_matrix(dataset, feature_names)?;
        let n_samples = features.nrows();

        if k < 2 {
            return Err(PipelineError::Training(
                "silhouette score requires at least 2 clusters, got k=1".to_string(),
            ));
        }

        let distinct = count_distinct_rows(&features);
        if k >= distinct {
            return Err(PipelineError::Training(format!(
                "k={} must be smaller than the number of distinct points ({})",
                k, distinct
            )));
        }

        info!(k, n_samples, n_excluded, features = ?feature_names, "Training clustering models");

        let mut candidates = Vec::with_capacity(self.variants.len());
        for variant in &self.variants {
            let model = variant.fit(&features, k)?;
            let labels = model.predict(&features);
            let score = silhouette(&features, &labels)?;

            info!(
                model_type = variant.model_type().tag(),
                silhouette = score,
                "Variant scored"
            );

            candidates.push(FittedCandidate { model, labels, score });
        }

        // Strictly greater replaces, so ties keep the earlier variant.
        let mut best = 0;
        for (idx, candidate) in candidates.iter().enumerate().skip(1) {
            if candidate.score > candidates[best].score {
                best = idx;
            }
        }

        let winner = &candidates[best];
        let bundle = ModelBundle::new(
            winner.model.clone(),
            feature_names.to_vec(),
            k,
            winner.score,
        );

        info!(
            model_type = bundle.model_type.tag(),
            silhouette = bundle.score,
            "Selected best model"
        );

        Ok(TrainingOutcome {
            bundle,
            candidates,
            n_samples,
            n_excluded,
        })
    }
}

/// Build the feature matrix, skipping rows with a missing feature value
pub fn feature_matrix(dataset: &Dataset, feature_names: &[String]) -> Result<(Array2<f64>, usize)> {
    if feature_names.is_empty() {
        return Err(PipelineError::Config("no usable features".to_string()));
    }

    let indices = feature_names
        .iter()
        .map(|name| {
            dataset.column_index(name).ok_or_else(|| {
                PipelineError::Config(format!("feature '{}' is not a dataset column", name))
            })
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut values = Vec::with_capacity(dataset.n_rows() * indices.len());
    let mut n_rows = 0;
    let mut n_excluded = 0;

    'rows: for row in dataset.rows() {
        let start = values.len();
        for (&idx, name) in indices.iter().zip(feature_names) {
            match &row[idx] {
                Value::Number(v) => values.push(*v),
                Value::Missing => {
                    values.truncate(start);
                    n_excluded += 1;
                    continue 'rows;
                }
                Value::Text(s) => {
                    return Err(PipelineError::Data(format!(
                        "feature '{}' contains non-numeric value {:?}",
                        name, s
                    )));
                }
            }
        }
        n_rows += 1;
    }

    if n_excluded > 0 {
        warn!(rows = n_excluded, "Rows with missing feature values excluded from training");
    }
    if n_rows == 0 {
        return Err(PipelineError::Data("no complete rows to train on".to_string()));
    }

    let matrix = Array2::from_shape_vec((n_rows, indices.len()), values)
        .map_err(|e| PipelineError::Data(format!("Failed to build feature matrix: {}", e)))?;

    Ok((matrix, n_excluded))
}

fn count_distinct_rows(features: &Array2<f64>) -> usize {
    features
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

/// Mean silhouette over all points; defined only for 2..=n-1 distinct labels.
///
/// A point alone in its cluster scores 0.
pub fn silhouette(features: &Array2<f64>, labels: &Array1<usize>) -> Result<f64> {
    let n_samples = features.nrows();
    if labels.len() != n_samples {
        return Err(PipelineError::Training(format!(
            "{} labels for {} samples",
            labels.len(),
            n_samples
        )));
    }

    let mut cluster_ids: Vec<usize> = labels.iter().copied().collect::<HashSet<_>>().into_iter().collect();
    cluster_ids.sort_unstable();
    let n_labels = cluster_ids.len();

    if n_labels < 2 || n_labels >= n_samples {
        return Err(PipelineError::Training(format!(
            "silhouette score undefined for {} clusters over {} samples",
            n_labels, n_samples
        )));
    }

    let slot = |label: usize| cluster_ids.binary_search(&label).unwrap_or(0);
    let sizes = labels.iter().fold(vec![0usize; n_labels], |mut sizes, &l| {
        sizes[slot(l)] += 1;
        sizes
    });

    let mut total = 0.0;
    for i in 0..n_samples {
        let own = slot(labels[i]);
        if sizes[own] == 1 {
            continue;
        }

        let mut sums = vec![0.0; n_labels];
        let row = features.row(i);
        for j in 0..n_samples {
            if i == j {
                continue;
            }
            let distance = (&row - &features.row(j)).mapv(|d| d * d).sum().sqrt();
            sums[slot(labels[j])] += distance;
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..n_labels)
            .filter(|&c| c != own)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    let score = total / n_samples as f64;
    if !score.is_finite() {
        return Err(PipelineError::Training("silhouette score is not finite".to_string()));
    }

    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    /// Three tight, well-separated spherical blobs
    fn blob_dataset() -> Dataset {
        let centers = [(-5.0, -5.0), (0.0, 5.0), (5.0, -5.0)];
        let offsets = [(0.0, 0.0), (0.2, 0.1), (-0.1, 0.2), (0.1, -0.2), (-0.2, -0.1)];
        let rows = centers
            .iter()
            .flat_map(|&(cx, cy)| {
                offsets
                    .iter()
                    .map(move |&(dx, dy)| vec![Value::Number(cx + dx), Value::Number(cy + dy)])
            })
            .collect();
        Dataset::from_rows(names(&["hour", "severity"]), rows).unwrap()
    }

    /// Variant with a fixed labelling, for exercising selection
    struct FixedVariant {
        model_type: ModelType,
        inner: KMeansVariant,
    }

    impl ClusteringVariant for FixedVariant {
        fn model_type(&self) -> ModelType {
            self.model_type
        }

        fn fit(&self, features: &Array2<f64>, k: usize) -> Result<ClusterModel> {
            self.inner.fit(features, k)
        }
    }

    #[test]
    fn test_silhouette_well_separated() {
        let x = array![[0.0, 0.0], [0.0, 0.1], [10.0, 10.0], [10.0, 10.1]];
        let labels = array![0, 0, 1, 1];

        let score = silhouette(&x, &labels).unwrap();
        assert!(score > 0.9 && score <= 1.0);
    }

    #[test]
    fn test_silhouette_singleton_cluster_scores_zero() {
        let x = array![[0.0], [1.0], [10.0]];
        let labels = array![0, 0, 1];

        // (0.9 + 8/9 + 0) / 3
        let score = silhouette(&x, &labels).unwrap();
        assert!((score - 0.596_296_296).abs() < 1e-6);
    }

    #[test]
    fn test_silhouette_label_values_need_not_be_contiguous() {
        let x = array![[0.0], [1.0], [10.0], [11.0]];

        let contiguous = silhouette(&x, &array![0, 0, 1, 1]).unwrap();
        let sparse = silhouette(&x, &array![3, 3, 7, 7]).unwrap();
        assert!((contiguous - sparse).abs() < 1e-12);
    }

    #[test]
    fn test_silhouette_undefined_cases() {
        let x = array![[0.0], [1.0], [2.0]];

        assert!(matches!(
            silhouette(&x, &array![0, 0, 0]),
            Err(PipelineError::Training(_))
        ));
        assert!(matches!(
            silhouette(&x, &array![0, 1, 2]),
            Err(PipelineError::Training(_))
        ));
    }

    #[test]
    fn test_train_selects_kmeans_on_spherical_blobs() {
        let dataset = blob_dataset();
        let trainer = Trainer::new(TrainerConfig::default());

        let outcome = trainer.train(&dataset, &names(&["hour", "severity"]), 3).unwrap();

        assert_eq!(outcome.bundle.model_type, ModelType::KMeans);
        assert_eq!(outcome.bundle.model_type.family(), "partition-based");
        assert_eq!(outcome.bundle.features, names(&["hour", "severity"]));
        assert_eq!(outcome.candidates.len(), 2);
        let km = outcome.score_of(ModelType::KMeans).unwrap();
        let gmm = outcome.score_of(ModelType::GaussianMixture).unwrap();
        assert!(km >= gmm);
        assert!((-1.0..=1.0).contains(&km));
        assert_eq!(outcome.n_samples, 15);
    }

    #[test]
    fn test_train_is_deterministic() {
        let dataset = blob_dataset();
        let features = names(&["hour", "severity"]);
        let trainer = Trainer::new(TrainerConfig { seed: 11 });

        let first = trainer.train(&dataset, &features, 3).unwrap();
        let second = trainer.train(&dataset, &features, 3).unwrap();

        assert_eq!(first.bundle.model_type, second.bundle.model_type);
        for (a, b) in first.candidates.iter().zip(&second.candidates) {
            assert_eq!(a.score, b.score);
            assert_eq!(a.labels, b.labels);
        }
    }

    #[test]
    fn test_tie_goes_to_first_variant() {
        let dataset = blob_dataset();
        let trainer = Trainer::with_variants(vec![
            Box::new(FixedVariant {
                model_type: ModelType::KMeans,
                inner: KMeansVariant::new(1),
            }),
            Box::new(FixedVariant {
                model_type: ModelType::KMeans,
                inner: KMeansVariant::new(1),
            }),
        ]);

        let outcome = trainer.train(&dataset, &names(&["hour", "severity"]), 3).unwrap();

        assert_eq!(outcome.candidates[0].score, outcome.candidates[1].score);
        assert_eq!(outcome.bundle.score, outcome.candidates[0].score);
    }

    #[test]
    fn test_invalid_k() {
        let dataset = blob_dataset();
        let features = names(&["hour", "severity"]);
        let trainer = Trainer::new(TrainerConfig::default());

        assert!(matches!(
            trainer.train(&dataset, &features, 0),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            trainer.train(&dataset, &features, 1),
            Err(PipelineError::Training(_))
        ));
        assert!(matches!(
            trainer.train(&dataset, &features, 15),
            Err(PipelineError::Training(_))
        ));
    }

    #[test]
    fn test_k_equal_to_distinct_points() {
        let rows = (0..6)
            .map(|i| vec![Value::Number((i % 3) as f64)])
            .collect();
        let dataset = Dataset::from_rows(names(&["hour"]), rows).unwrap();

        let result = Trainer::new(TrainerConfig::default()).train(&dataset, &names(&["hour"]), 3);
        assert!(matches!(result, Err(PipelineError::Training(_))));
    }

    #[test]
    fn test_feature_matrix_skips_incomplete_rows() {
        let dataset = Dataset::from_rows(
            names(&["hour", "severity"]),
            vec![
                vec![Value::Number(1.0), Value::Number(2.0)],
                vec![Value::Missing, Value::Number(3.0)],
                vec![Value::Number(4.0), Value::Number(5.0)],
            ],
        )
        .unwrap();

        let (matrix, excluded) = feature_matrix(&dataset, &names(&["hour", "severity"])).unwrap();

        assert_eq!(matrix, array![[1.0, 2.0], [4.0, 5.0]]);
        assert_eq!(excluded, 1);
    }

    #[test]
    fn test_feature_matrix_errors() {
        let dataset = Dataset::from_rows(
            names(&["hour"]),
            vec![vec![Value::Missing]],
        )
        .unwrap();

        assert!(matches!(
            feature_matrix(&dataset, &names(&["month"])),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            feature_matrix(&dataset, &names(&["hour"])),
            Err(PipelineError::Data(_))
        ));
        assert!(matches!(
            feature_matrix(&dataset, &[]),
            Err(PipelineError::Config(_))
        ));
    }
}
