use crate::data::{Dataset, Value};
use crate::error::Result;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use tracing::{info, warn};

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const SEVERITY_COLUMN: &str = "severity";
pub const HOUR_COLUMN: &str = "hour";
pub const DAY_OF_WEEK_COLUMN: &str = "dayofweek";
pub const MONTH_COLUMN: &str = "month";

/// Candidate model features in their canonical order
pub const CANDIDATE_FEATURES: [&str; 4] = [
    HOUR_COLUMN,
    DAY_OF_WEEK_COLUMN,
    MONTH_COLUMN,
    SEVERITY_COLUMN,
];

/// Timestamp layouts tried after RFC 3339, most specific first
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const NORMALIZED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a timestamp string into its wall-clock date and time.
///
/// Offset-bearing timestamps keep their local wall time rather than being
/// converted to UTC. Returns `None` when no supported layout matches.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.naive_local());
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Calendar features derived from one timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFeatures {
    /// Hour of day, 0-23
    pub hour: u32,

    /// Day of week, Monday = 0 through Sunday = 6
    pub dayofweek: u32,

    /// Month, 1-12
    pub month: u32,
}

impl CalendarFeatures {
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        Self {
            hour: dt.hour(),
            dayofweek: dt.weekday().num_days_from_monday(),
            month: dt.month(),
        }
    }
}

/// Derives calendar features and normalizes severity
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    /// Add hour/dayofweek/month from `timestamp` and coerce `severity` to a number
    pub fn engineer(&self, dataset: &Dataset) -> Result<Dataset> {
        let mut engineered = dataset.clone();

        if engineered.has_column(TIMESTAMP_COLUMN) {
            self.add_calendar_features(&mut engineered)?;
        }

        if let Some(idx) = engineered.column_index(SEVERITY_COLUMN) {
            engineered.map_column(idx, |value| Value::Number(coerce_severity(value)));
        }

        Ok(engineered)
    }

    fn add_calendar_features(&self, dataset: &mut Dataset) -> Result<()> {
        let parsed: Vec<Option<NaiveDateTime>> = dataset
            .column(TIMESTAMP_COLUMN)
            .map(|values| {
                values
                    .map(|value| value.as_text().and_then(parse_timestamp))
                    .collect()
            })
            .unwrap_or_default();

        let unparseable = parsed.iter().filter(|dt| dt.is_none()).count();
        if unparseable > 0 {
            warn!(
                rows = unparseable,
                "Unparseable timestamps, calendar features left empty"
            );
        }

        let calendar: Vec<Option<CalendarFeatures>> = parsed
            .iter()
            .map(|dt| dt.as_ref().map(CalendarFeatures::from_datetime))
            .collect();

        let timestamps = parsed
            .iter()
            .map(|dt| match dt {
                Some(dt) => Value::Text(dt.format(NORMALIZED_FORMAT).to_string()),
                None => Value::Missing,
            })
            .collect();
        dataset.set_column(TIMESTAMP_COLUMN, timestamps)?;

        dataset.set_column(
            HOUR_COLUMN,
            calendar
                .iter()
                .map(|c| Value::from(c.map(|c| c.hour as f64)))
                .collect(),
        )?;
        dataset.set_column(
            DAY_OF_WEEK_COLUMN,
            calendar
                .iter()
                .map(|c| Value::from(c.map(|c| c.dayofweek as f64)))
                .collect(),
        )?;
        dataset.set_column(
            MONTH_COLUMN,
            calendar
                .iter()
                .map(|c| Value::from(c.map(|c| c.month as f64)))
                .collect(),
        )?;

        info!(
            rows = parsed.len(),
            parsed = parsed.len() - unparseable,
            "Calendar features derived"
        );

        Ok(())
    }
}

/// Numeric severity; anything missing or non-numeric becomes 0
fn coerce_severity(value: &Value) -> f64 {
    match value {
        Value::Number(n) if n.is_finite() => *n,
        Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Candidate features present in the dataset, in canonical order
pub fn available_features(dataset: &Dataset) -> Vec<String> {
    CANDIDATE_FEATURES
        .iter()
        .filter(|feature| dataset.has_column(feature))
        .map(|feature| feature.to_string())
        .collect()
}
