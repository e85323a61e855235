use crate::error::{PipelineError, Result};
use crate::ml::models::{ClusterModel, ModelType};
use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_clustering::{GaussianMixtureModel, KMeans};
use linfa_nn::distance::L2Dist;
use ndarray::Array2;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// A clustering algorithm that can be fit on a scaled feature matrix
pub trait ClusteringVariant: Send + Sync {
    /// Variant tag
    fn model_type(&self) -> ModelType;

    /// Fit `k` clusters; the same seed and input always yield the same model
    fn fit(&self, features: &Array2<f64>, k: usize) -> Result<ClusterModel>;
}

/// Partition-based variant: k-means with Euclidean distance
#[derive(Debug, Clone)]
pub struct KMeansVariant {
    seed: u64,
}

impl KMeansVariant {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl ClusteringVariant for KMeansVariant {
    fn model_type(&self) -> ModelType {
        ModelType::KMeans
    }

    fn fit(&self, features: &Array2<f64>, k: usize) -> Result<ClusterModel> {
        let rng = Xoshiro256Plus::seed_from_u64(self.seed);
        let dataset = DatasetBase::from(features.clone());

        let model: KMeans<f64, L2Dist> = KMeans::params_with_rng(k, rng)
            .fit(&dataset)
            .map_err(|e| PipelineError::Training(format!("Failed to fit k-means: {}", e)))?;

        Ok(ClusterModel::KMeans(model))
    }
}

/// linfa fails a fit on EM non-convergence; its default cap is 100 steps
const GMM_MAX_ITERATIONS: u64 = 500;

/// Mixture variant: Gaussian components fitted with expectation-maximization
#[derive(Debug, Clone)]
pub struct GaussianMixtureVariant {
    seed: u64,
}

impl GaussianMixtureVariant {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl ClusteringVariant for GaussianMixtureVariant {
    fn model_type(&self) -> ModelType {
        ModelType::GaussianMixture
    }

    fn fit(&self, features: &Array2<f64>, k: usize) -> Result<ClusterModel> {
        let rng = Xoshiro256Plus::seed_from_u64(self.seed);
        let dataset = DatasetBase::from(features.clone());

        let model: GaussianMixtureModel<f64> = GaussianMixtureModel::params_with_rng(k, rng)
            .max_n_iterations(GMM_MAX_ITERATIONS)
            .fit(&dataset)
            .map_err(|e| {
                PipelineError::Training(format!("Failed to fit Gaussian mixture: {}", e))
            })?;

        Ok(ClusterModel::GaussianMixture(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Array2<f64> {
        array![
            [0.0, 0.1],
            [0.1, 0.0],
            [-0.1, 0.05],
            [0.05, -0.1],
            [10.0, 10.1],
            [10.1, 9.9],
            [9.9, 10.0],
            [10.05, 10.05],
        ]
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let x = blobs();
        let model = KMeansVariant::new(42).fit(&x, 2).unwrap();
        let labels = model.predict(&x);

        assert_eq!(model.model_type(), ModelType::KMeans);
        assert_eq!(model.n_clusters(), 2);
        assert!(labels.iter().take(4).all(|&l| l == labels[0]));
        assert!(labels.iter().skip(4).all(|&l| l == labels[4]));
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn test_gmm_separates_blobs() {
        let x = blobs();
        let model = GaussianMixtureVariant::new(42).fit(&x, 2).unwrap();
        let labels = model.predict(&x);

        assert_eq!(model.model_type(), ModelType::GaussianMixture);
        assert_eq!(model.n_features(), 2);
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let x = blobs();
        let first = KMeansVariant::new(7).fit(&x, 2).unwrap();
        let second = KMeansVariant::new(7).fit(&x, 2).unwrap();

        assert_eq!(first.predict(&x), second.predict(&x));
    }
}
