/// Prometheus metrics for the prediction service
///
/// All metrics live in one process-wide registry and are exposed in the text
/// format at `/metrics`.
///
/// # Example
/// ```no_run
/// use accident_clustering::metrics::PREDICTIONS_TOTAL;
///
/// PREDICTIONS_TOTAL.with_label_values(&["2"]).inc();
/// ```

use lazy_static::lazy_static;
use prometheus::{Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

const NAMESPACE: &str = "accident_clustering";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Successful predictions
    ///
    /// Labels: cluster
    pub static ref PREDICTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("predictions_total", "Total number of successful predictions")
            .namespace(NAMESPACE),
        &["cluster"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Failed predictions
    ///
    /// Labels: error_code
    pub static ref PREDICTION_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("prediction_errors_total", "Total number of failed predictions")
            .namespace(NAMESPACE),
        &["error_code"]
    ).expect("Failed to create PREDICTION_ERRORS_TOTAL metric");

    /// Prediction latency in seconds
    ///
    /// Labels: outcome
    pub static ref PREDICTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Prediction latency in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["outcome"]
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// 1 when a model is loaded, 0 otherwise
    pub static ref MODEL_LOADED: Gauge = Gauge::with_opts(
        Opts::new("model_loaded", "Whether a model bundle is currently loaded")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_LOADED metric");

    /// Model reloads
    ///
    /// Labels: result
    pub static ref MODEL_RELOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("model_reloads_total", "Total number of model reload attempts")
            .namespace(NAMESPACE),
        &["result"]
    ).expect("Failed to create MODEL_RELOADS_TOTAL metric");
}

/// Register all metrics with the global registry
///
/// Returns an error if called twice.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTION_ERRORS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTION_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MODEL_LOADED.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MODEL_RELOADS_TOTAL.clone()))?;

    tracing::debug!("Prometheus metrics registered");
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

/// Record whether the current context has a model
pub fn set_model_loaded(loaded: bool) {
    MODEL_LOADED.set(if loaded { 1.0 } else { 0.0 });
}
