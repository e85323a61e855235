/// Batch pipeline steps and a local flow runner
///
/// The two steps are independent process-level units: `preprocess` turns a
/// raw accident CSV into a scaled dataset plus scaler artifact, and `train`
/// turns the scaled dataset into a model bundle. `run_flow` chains them with
/// bounded retries.

pub mod flow;
pub mod steps;

pub use flow::{run_flow, FlowConfig, FlowSummary};
pub use steps::{file_sha256, preprocess, train, PreprocessSummary};
