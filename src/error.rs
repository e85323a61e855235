use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Pipeline and serving error types
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed or empty input that prevents a stage from producing a result
    #[error("Data error: {0}")]
    Data(String),

    /// Caller-supplied configuration is invalid for the data at hand
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record is missing a feature required by a fitted scaler or model
    #[error("Schema error: {0}")]
    Schema(String),

    /// Clustering cannot produce a well-defined quality score
    #[error("Training error: {0}")]
    Training(String),

    /// Persisted artifact missing or corrupt
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Serving was asked to predict without a loaded model bundle
    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    /// Request validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write errors
    #[error("CSV error: {0}")]
    Csv(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PipelineError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::Schema(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::ModelNotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Artifact(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Data(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Training(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            PipelineError::Data(_) => "DATA_ERROR",
            PipelineError::Config(_) => "CONFIG_ERROR",
            PipelineError::Schema(_) => "SCHEMA_ERROR",
            PipelineError::Training(_) => "TRAINING_ERROR",
            PipelineError::Artifact(_) => "ARTIFACT_ERROR",
            PipelineError::ModelNotLoaded(_) => "MODEL_NOT_LOADED",
            PipelineError::Validation(_) => "VALIDATION_ERROR",
            PipelineError::Io(_) => "IO_ERROR",
            PipelineError::Csv(_) => "CSV_ERROR",
            PipelineError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Convert PipelineError to HTTP response
impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        tracing::error!(
            error_code = error_code,
            status_code = status.as_u16(),
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

/// Conversion from csv::Error
impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Csv(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for PipelineError {
    fn from(err: validator::ValidationErrors) -> Self {
        PipelineError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PipelineError>;
