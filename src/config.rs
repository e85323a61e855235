use crate::ml::TrainerConfig;
use crate::pipeline::FlowConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the model bundle path
pub const MODEL_PATH_ENV: &str = "MODEL_PATH";

/// Environment variable overriding the scaler path
pub const SCALER_PATH_ENV: &str = "SCALER_PATH";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Artifact locations
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Training parameters
    #[serde(default)]
    pub training: TrainingConfig,

    /// Retry policy for the local flow runner
    #[serde(default)]
    pub flow: FlowPolicyConfig,

    /// Experiment tracking
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        let mut config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: ACCIDENTS_)
            .add_source(
                config::Environment::with_prefix("ACCIDENTS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.apply_artifact_overrides(
            std::env::var(MODEL_PATH_ENV).ok(),
            std::env::var(SCALER_PATH_ENV).ok(),
        );

        Ok(config)
    }

    /// Parse the embedded defaults only
    pub fn embedded_defaults() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()?
            .try_deserialize()
    }

    /// Serving artifact paths taken from `MODEL_PATH` / `SCALER_PATH`
    pub fn apply_artifact_overrides(&mut self, model_path: Option<String>, scaler_path: Option<String>) {
        if let Some(path) = model_path.filter(|p| !p.is_empty()) {
            self.artifacts.model_path = PathBuf::from(path);
        }
        if let Some(path) = scaler_path.filter(|p| !p.is_empty()) {
            self.artifacts.scaler_path = PathBuf::from(path);
        }
    }

    /// Flow settings assembled from the artifact, training and flow sections
    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig {
            raw_path: self.artifacts.raw_path.clone(),
            processed_path: self.artifacts.processed_path.clone(),
            scaler_path: self.artifacts.scaler_path.clone(),
            model_path: self.artifacts.model_path.clone(),
            k: self.training.k,
            trainer: TrainerConfig {
                seed: self.training.seed,
            },
            retries: self.flow.retries,
            retry_delay: Duration::from_secs(self.flow.retry_delay_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_raw_path")]
    pub raw_path: PathBuf,

    #[serde(default = "default_processed_path")]
    pub processed_path: PathBuf,

    /// Model bundle read by serving and written by training
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Scaler state written by preprocessing
    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            raw_path: default_raw_path(),
            processed_path: default_processed_path(),
            model_path: default_model_path(),
            scaler_path: default_scaler_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of clusters
    #[serde(default = "default_k")]
    pub k: usize,

    /// Seed for the clustering variants
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Experiment name used by the tracker
    #[serde(default = "default_experiment")]
    pub experiment: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            seed: default_seed(),
            experiment: default_experiment(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowPolicyConfig {
    /// Extra attempts per step
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay between attempts (seconds)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for FlowPolicyConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Record runs on disk
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Root directory for run records
    #[serde(default = "default_tracking_root")]
    pub root: PathBuf,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: default_tracking_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_raw_path() -> PathBuf {
    PathBuf::from("data/raw/accidents.csv")
}

fn default_processed_path() -> PathBuf {
    PathBuf::from("data/processed/accidents_processed.csv")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/best_model.bin")
}

fn default_scaler_path() -> PathBuf {
    PathBuf::from("models/scaler.bin")
}

fn default_k() -> usize {
    5
}

fn default_seed() -> u64 {
    42
}

fn default_experiment() -> String {
    "accident-clustering".to_string()
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay() -> u64 {
    5
}

fn default_tracking_root() -> PathBuf {
    PathBuf::from("mlruns")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
