/// Preprocessing stages applied to raw accident records
///
/// Records flow through three stages in order:
/// - Cleaning: duplicate removal, location filtering, median imputation
/// - Feature engineering: calendar features from timestamps, numeric severity
/// - Scaling: standardization with persisted parameters

pub mod cleaner;
pub mod features;
pub mod scaler;

pub use cleaner::{Cleaner, CleanerConfig, CleaningStats};
pub use features::{
    available_features, parse_timestamp, CalendarFeatures, FeatureEngineer, CANDIDATE_FEATURES,
};
pub use scaler::{ScalerState, StandardScaler};
