use crate::artifacts::{Versioned, FORMAT_VERSION};
use crate::error::{PipelineError, Result};
use linfa::traits::Predict;
use linfa_clustering::{GaussianMixtureModel, KMeans};
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Clustering variant tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ModelType {
    /// Partition-based clustering (k-means)
    #[serde(rename = "kmeans")]
    KMeans,

    /// Gaussian mixture fitted with expectation-maximization
    #[serde(rename = "gmm")]
    GaussianMixture,
}

impl ModelType {
    /// Short tag used in artifacts and tracked metric names
    pub fn tag(&self) -> &'static str {
        match self {
            ModelType::KMeans => "kmeans",
            ModelType::GaussianMixture => "gmm",
        }
    }

    /// Algorithm family
    pub fn family(&self) -> &'static str {
        match self {
            ModelType::KMeans => "partition-based",
            ModelType::GaussianMixture => "mixture",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::KMeans => write!(f, "K-Means"),
            ModelType::GaussianMixture => write!(f, "Gaussian Mixture"),
        }
    }
}

/// Parameters of a fitted clustering model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClusterModel {
    KMeans(KMeans<f64, L2Dist>),
    GaussianMixture(GaussianMixtureModel<f64>),
}

impl ClusterModel {
    pub fn model_type(&self) -> ModelType {
        match self {
            ClusterModel::KMeans(_) => ModelType::KMeans,
            ClusterModel::GaussianMixture(_) => ModelType::GaussianMixture,
        }
    }

    /// Number of clusters (centroids or mixture components)
    pub fn n_clusters(&self) -> usize {
        match self {
            ClusterModel::KMeans(model) => model.centroids().nrows(),
            ClusterModel::GaussianMixture(model) => model.weights().len(),
        }
    }

    /// Number of features the model was trained on
    pub fn n_features(&self) -> usize {
        match self {
            ClusterModel::KMeans(model) => model.centroids().ncols(),
            ClusterModel::GaussianMixture(model) => model.means().ncols(),
        }
    }

    /// Assign every row to a cluster
    pub fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        match self {
            ClusterModel::KMeans(model) => model.predict(features),
            ClusterModel::GaussianMixture(model) => model.predict(features),
        }
    }

    /// Assign a single scaled feature vector to a cluster
    pub fn predict_one(&self, features: &[f64]) -> Result<usize> {
        if features.len() != self.n_features() {
            return Err(PipelineError::Schema(format!(
                "model expects {} features, got {}",
                self.n_features(),
                features.len()
            )));
        }

        let row = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| PipelineError::Schema(format!("Failed to create feature array: {}", e)))?;

        Ok(self.predict(&row)[0])
    }
}

/// The persisted artifact consumed by serving
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    /// Artifact format version
    pub format_version: u32,

    /// Winning fitted model
    pub model: ClusterModel,

    /// Winning variant tag
    #[serde(rename = "type")]
    pub model_type: ModelType,

    /// Feature order the model expects
    pub features: Vec<String>,

    /// Number of clusters requested
    pub k: usize,

    /// Silhouette score of the winning model
    pub score: f64,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,
}

impl ModelBundle {
    pub fn new(model: ClusterModel, features: Vec<String>, k: usize, score: f64) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            model_type: model.model_type(),
            model,
            features,
            k,
            score,
            trained_at: chrono::Utc::now(),
        }
    }
}

impl Versioned for ModelBundle {
    fn format_version(&self) -> u32 {
        self.format_version
    }
}

/// Trainer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Seed for both stochastic clustering variants
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_tags() {
        assert_eq!(ModelType::KMeans.tag(), "kmeans");
        assert_eq!(ModelType::GaussianMixture.tag(), "gmm");
        assert_eq!(ModelType::KMeans.family(), "partition-based");
        assert_eq!(ModelType::GaussianMixture.family(), "mixture");
        assert_eq!(ModelType::GaussianMixture.to_string(), "Gaussian Mixture");
    }

    #[test]
    fn test_model_type_serde() {
        assert_eq!(serde_json::to_string(&ModelType::KMeans).unwrap(), "\"kmeans\"");
        let parsed: ModelType = serde_json::from_str("\"gmm\"").unwrap();
        assert_eq!(parsed, ModelType::GaussianMixture);
    }

    #[test]
    fn test_trainer_config_default() {
        assert_eq!(TrainerConfig::default().seed, 42);
    }
}
