//! Serving contract: health and single-record prediction
//!
//! A [`ServingContext`] is built once from the model bundle and scaler paths
//! and never mutated. A failed load is captured as [`ModelState::Failed`] so
//! health keeps answering and predict returns a structured error. Reloading
//! builds a fresh context and swaps it into the [`ModelHandle`].

use crate::artifacts::{load_artifact, Versioned};
use crate::data::Record;
use crate::error::{PipelineError, Result};
use crate::ml::{ModelBundle, ModelType};
use crate::preprocessing::features::{
    DAY_OF_WEEK_COLUMN, HOUR_COLUMN, MONTH_COLUMN, SEVERITY_COLUMN,
};
use crate::preprocessing::ScalerState;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// One accident's feature values
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PredictRequest {
    #[validate(range(min = 0, max = 23))]
    pub hour: i64,

    #[validate(range(min = 0, max = 6))]
    pub dayofweek: i64,

    #[validate(range(min = 1, max = 12))]
    pub month: i64,

    pub severity: f64,
}

impl PredictRequest {
    /// Range checks plus a finite severity
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if !self.severity.is_finite() {
            return Err(PipelineError::Validation(
                "severity must be a finite number".to_string(),
            ));
        }
        Ok(())
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with(HOUR_COLUMN, self.hour as f64)
            .with(DAY_OF_WEEK_COLUMN, self.dayofweek as f64)
            .with(MONTH_COLUMN, self.month as f64)
            .with(SEVERITY_COLUMN, self.severity)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictResponse {
    pub cluster: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<ModelType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A model bundle paired with the scaler it was trained behind
#[derive(Debug, Clone)]
pub struct LoadedModel {
    bundle: ModelBundle,
    scaler: ScalerState,
}

impl LoadedModel {
    pub fn new(bundle: ModelBundle, scaler: ScalerState) -> Result<Self> {
        scaler.validate()?;
        if bundle.features != scaler.features {
            return Err(PipelineError::Artifact(format!(
                "model features {:?} do not match scaler features {:?}",
                bundle.features, scaler.features
            )));
        }
        if bundle.model.n_features() != bundle.features.len() {
            return Err(PipelineError::Artifact(format!(
                "model was fitted on {} features but lists {}",
                bundle.model.n_features(),
                bundle.features.len()
            )));
        }
        Ok(Self { bundle, scaler })
    }

    pub fn load(model_path: &Path, scaler_path: &Path) -> Result<Self> {
        let bundle: ModelBundle = load_artifact(model_path)?;
        let scaler: ScalerState = load_artifact(scaler_path)?;
        Self::new(bundle, scaler)
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn scaler(&self) -> &ScalerState {
        &self.scaler
    }

    /// Scale the request with the persisted scaler and assign a cluster
    pub fn predict(&self, request: &PredictRequest) -> Result<usize> {
        let scaled = self
            .scaler
            .transform(&request.to_record(), &self.bundle.features)?;
        self.bundle.model.predict_one(&scaled)
    }
}

#[derive(Debug, Clone)]
pub enum ModelState {
    Loaded(LoadedModel),
    Failed(String),
}

/// Immutable snapshot of what the server can serve
#[derive(Debug)]
pub struct ServingContext {
    state: ModelState,
    model_path: PathBuf,
    scaler_path: PathBuf,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl ServingContext {
    /// Load artifacts; a failure is recorded rather than returned
    pub fn load(model_path: impl Into<PathBuf>, scaler_path: impl Into<PathBuf>) -> Self {
        let model_path = model_path.into();
        let scaler_path = scaler_path.into();

        let state = match LoadedModel::load(&model_path, &scaler_path) {
            Ok(model) => {
                info!(
                    model = %model_path.display(),
                    model_type = model.bundle.model_type.tag(),
                    features = ?model.bundle.features,
                    "Model loaded"
                );
                ModelState::Loaded(model)
            }
            Err(e) => {
                warn!(model = %model_path.display(), error = %e, "Model not loaded");
                ModelState::Failed(e.to_string())
            }
        };

        Self {
            state,
            model_path,
            scaler_path,
            created_at: chrono::Utc::now(),
        }
    }

    /// Context around an already loaded model
    pub fn from_model(model: LoadedModel) -> Self {
        Self {
            state: ModelState::Loaded(model),
            model_path: PathBuf::new(),
            scaler_path: PathBuf::new(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ModelState::Loaded(_))
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn scaler_path(&self) -> &Path {
        &self.scaler_path
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    pub fn health(&self) -> HealthResponse {
        match &self.state {
            ModelState::Loaded(model) => HealthResponse {
                status: "ok".to_string(),
                model_loaded: true,
                model_type: Some(model.bundle.model_type),
                features: Some(model.bundle.features.clone()),
                error: None,
            },
            ModelState::Failed(reason) => HealthResponse {
                status: "ok".to_string(),
                model_loaded: false,
                model_type: None,
                features: None,
                error: Some(reason.clone()),
            },
        }
    }

    pub fn predict(&self, request: &PredictRequest) -> Result<PredictResponse> {
        request.check()?;

        match &self.state {
            ModelState::Loaded(model) => Ok(PredictResponse {
                cluster: model.predict(request)?,
            }),
            ModelState::Failed(reason) => Err(PipelineError::ModelNotLoaded(reason.clone())),
        }
    }
}

/// Shared pointer to the current serving context
#[derive(Debug)]
pub struct ModelHandle {
    current: RwLock<Arc<ServingContext>>,
}

impl ModelHandle {
    pub fn new(context: ServingContext) -> Self {
        Self {
            current: RwLock::new(Arc::new(context)),
        }
    }

    /// Snapshot for one request
    pub fn current(&self) -> Arc<ServingContext> {
        self.current.read().clone()
    }

    /// Replace the current context
    pub fn swap(&self, context: ServingContext) -> Arc<ServingContext> {
        let context = Arc::new(context);
        *self.current.write() = context.clone();
        context
    }

    /// Rebuild from the current context's artifact paths
    pub fn reload(&self) -> Arc<ServingContext> {
        let previous = self.current();
        let context = ServingContext::load(previous.model_path(), previous.scaler_path());
        self.swap(context)
    }
}
