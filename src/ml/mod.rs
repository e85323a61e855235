/// Clustering models for accident records
///
/// This module provides:
/// - Two clustering variants behind one trait (k-means, Gaussian mixture)
/// - Silhouette-based model selection
/// - The persisted model bundle consumed by serving

pub mod clustering;
pub mod models;
pub mod trainer;

pub use clustering::{ClusteringVariant, GaussianMixtureVariant, KMeansVariant};
pub use models::{ClusterModel, ModelBundle, ModelType, TrainerConfig};
pub use trainer::{feature_matrix, silhouette, FittedCandidate, Trainer, TrainingOutcome};
