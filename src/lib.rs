//! Accident clustering
//!
//! Batch pipeline that cleans raw accident records, derives calendar
//! features, standardizes them, and clusters accidents with k-means or a
//! Gaussian mixture (whichever scores the higher silhouette). The winning
//! model is served over HTTP.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod pipeline;
pub mod preprocessing;
pub mod serving;
pub mod tracking;

pub use error::{PipelineError, Result};
