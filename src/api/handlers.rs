use crate::api::AppState;
use crate::error::Result;
use crate::metrics::{
    gather_metrics, set_model_loaded, MODEL_RELOADS_TOTAL, PREDICTIONS_TOTAL,
    PREDICTION_DURATION_SECONDS, PREDICTION_ERRORS_TOTAL,
};
use crate::serving::{HealthResponse, PredictRequest, PredictResponse};
use axum::{extract::State, http::header, response::IntoResponse, Json};
use std::time::Instant;

/// Health check endpoint; answers even when no model is loaded
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.models.current().health())
}

/// Assign one accident to a cluster
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>> {
    let started = Instant::now();
    let context = state.models.current();

    match context.predict(&request) {
        Ok(response) => {
            PREDICTION_DURATION_SECONDS
                .with_label_values(&["ok"])
                .observe(started.elapsed().as_secs_f64());
            PREDICTIONS_TOTAL
                .with_label_values(&[response.cluster.to_string().as_str()])
                .inc();

            tracing::debug!(cluster = response.cluster, "Prediction served");
            Ok(Json(response))
        }
        Err(e) => {
            PREDICTION_DURATION_SECONDS
                .with_label_values(&["error"])
                .observe(started.elapsed().as_secs_f64());
            PREDICTION_ERRORS_TOTAL
                .with_label_values(&[e.error_code()])
                .inc();
            Err(e)
        }
    }
}

/// Reload artifacts from disk and swap the serving context
pub async fn reload_model(State(state): State<AppState>) -> Json<HealthResponse> {
    let models = state.models.clone();
    let context = tokio::task::spawn_blocking(move || models.reload())
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Reload task failed: {}", e);
            state.models.current()
        });

    let loaded = context.is_loaded();
    set_model_loaded(loaded);
    MODEL_RELOADS_TOTAL
        .with_label_values(&[if loaded { "loaded" } else { "failed" }])
        .inc();

    tracing::info!(model_loaded = loaded, "Model reload finished");
    Json(context.health())
}

/// Prometheus scrape endpoint
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}
