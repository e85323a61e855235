use crate::artifacts::write_atomic;
use crate::data::{Dataset, Value};
use crate::error::{PipelineError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Load a CSV file with a header row into a dataset
pub fn read_csv(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| {
        PipelineError::Data(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if columns.is_empty() {
        return Err(PipelineError::Data(format!(
            "{} has no header row",
            path.display()
        )));
    }

    let mut dataset = Dataset::new(columns);
    for result in reader.records() {
        let record = result?;
        dataset.push_row(record.iter().map(Value::parse).collect())?;
    }

    tracing::debug!(
        path = %path.display(),
        rows = dataset.n_rows(),
        columns = dataset.columns().len(),
        "Loaded CSV"
    );

    Ok(dataset)
}

/// Render a dataset as CSV bytes (header + rows)
pub fn to_csv_bytes(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(dataset.columns())?;
    for row in dataset.rows() {
        writer.write_record(row.iter().map(Value::to_field))?;
    }

    writer
        .into_inner()
        .map_err(|e| PipelineError::Csv(format!("Failed to flush CSV buffer: {}", e)))
}

/// Write a dataset as CSV (header + rows), replacing `path` atomically
pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    let bytes = to_csv_bytes(dataset)?;
    write_atomic(path, &bytes)?;

    tracing::debug!(path = %path.display(), rows = dataset.n_rows(), "Wrote CSV");
    Ok(())
}
