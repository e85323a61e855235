use accident_clustering::{
    config::Config,
    ml::TrainerConfig,
    pipeline::{self, FlowConfig},
    tracking::{ExperimentTracker, FileTracker, NoopTracker, RunStatus},
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "accident-cli")]
#[command(about = "Accident clustering pipeline and client", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, engineer and scale a raw CSV
    Preprocess {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Scaler artifact path (defaults to the configured one)
        #[arg(short, long)]
        scaler: Option<PathBuf>,
    },

    /// Train both clustering variants and persist the best bundle
    Train {
        #[arg(short, long)]
        input: PathBuf,

        /// Number of clusters (defaults to the configured one)
        #[arg(short, long)]
        k: Option<usize>,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short = 'x', long)]
        experiment: Option<String>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Preprocess then train, retrying each step
    Run {
        #[arg(long)]
        raw: Option<PathBuf>,

        #[arg(long)]
        processed: Option<PathBuf>,

        #[arg(long)]
        model: Option<PathBuf>,

        #[arg(long)]
        scaler: Option<PathBuf>,

        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Check server health
    Health,

    /// Ask a running server for a cluster assignment
    Predict {
        #[arg(long)]
        hour: i64,

        #[arg(long)]
        dayofweek: i64,

        #[arg(long)]
        month: i64,

        #[arg(long)]
        severity: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accident_clustering=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;
    let client = Client::new();

    match cli.command {
        Commands::Preprocess {
            input,
            output,
            scaler,
        } => {
            let scaler = scaler.unwrap_or_else(|| config.artifacts.scaler_path.clone());
            let summary = tokio::task::spawn_blocking(move || {
                pipeline::preprocess(&input, &output, &scaler)
            })
            .await??;

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "rows": summary.rows,
                    "features": summary.features,
                    "duplicates_removed": summary.cleaning.duplicates_removed,
                    "missing_location_removed": summary.cleaning.missing_location_removed,
                    "values_imputed": summary.cleaning.values_imputed,
                }))?
            );
        }

        Commands::Train {
            input,
            k,
            output,
            experiment,
            seed,
        } => {
            let k = k.unwrap_or(config.training.k);
            let trainer = TrainerConfig {
                seed: seed.unwrap_or(config.training.seed),
            };
            let experiment = experiment.unwrap_or_else(|| config.training.experiment.clone());
            let mut tracker = open_tracker(&config, &experiment)?;

            let outcome = tokio::task::spawn_blocking(move || {
                let result = pipeline::train(&input, k, &output, &trainer, tracker.as_mut());
                let status = if result.is_ok() {
                    RunStatus::Finished
                } else {
                    RunStatus::Failed
                };
                tracker.finish(status)?;
                result
            })
            .await??;

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "type": outcome.bundle.model_type,
                    "family": outcome.bundle.model_type.family(),
                    "features": outcome.bundle.features,
                    "k": outcome.bundle.k,
                    "score": outcome.bundle.score,
                }))?
            );
        }

        Commands::Run {
            raw,
            processed,
            model,
            scaler,
            k,
        } => {
            let defaults = config.flow_config();
            let flow = FlowConfig {
                raw_path: raw.unwrap_or(defaults.raw_path),
                processed_path: processed.unwrap_or(defaults.processed_path),
                model_path: model.unwrap_or(defaults.model_path),
                scaler_path: scaler.unwrap_or(defaults.scaler_path),
                k: k.unwrap_or(defaults.k),
                trainer: defaults.trainer,
                retries: defaults.retries,
                retry_delay: defaults.retry_delay,
            };
            let mut tracker = open_tracker(&config, &config.training.experiment)?;

            let summary = tokio::task::spawn_blocking(move || {
                pipeline::run_flow(&flow, tracker.as_mut())
            })
            .await??;

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "rows": summary.preprocess.rows,
                    "type": summary.training.bundle.model_type,
                    "score": summary.training.bundle.score,
                }))?
            );
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .timeout(Duration::from_secs(10))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Predict {
            hour,
            dayofweek,
            month,
            severity,
        } => {
            let response = client
                .post(format!("{}/predict", cli.endpoint))
                .timeout(Duration::from_secs(10))
                .json(&json!({
                    "hour": hour,
                    "dayofweek": dayofweek,
                    "month": month,
                    "severity": severity,
                }))
                .send()
                .await?;

            let status = response.status();
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);

            if !status.is_success() {
                anyhow::bail!("prediction failed with status {}", status);
            }
        }
    }

    Ok(())
}

fn open_tracker(config: &Config, experiment: &str) -> anyhow::Result<Box<dyn ExperimentTracker>> {
    if !config.tracking.enabled {
        return Ok(Box::new(NoopTracker));
    }

    let tracker = FileTracker::start(&config.tracking.root, experiment)
        .with_context(|| format!("failed to start tracking run in {}", config.tracking.root.display()))?;
    Ok(Box::new(tracker))
}
