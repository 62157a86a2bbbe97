//! CSV export via arrow-csv

use super::{from_record_batch, observation_schema, to_record_batch, ExportError};
use crate::analytics::PairObservation;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Write observations as CSV with a header row
///
/// Undefined statistics are written as empty cells.
pub fn write_csv<W: Write>(writer: W, observations: &[PairObservation]) -> Result<(), ExportError> {
    let batch = to_record_batch(observations)?;
    let mut writer = WriterBuilder::new().with_header(true).build(writer);
    writer.write(&batch)?;
    Ok(())
}

/// Read observations back from CSV written by [`write_csv`]
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<PairObservation>, ExportError> {
    let reader = ReaderBuilder::new(observation_schema())
        .with_header(true)
        .build(reader)?;

    let mut observations = Vec::new();
    for batch in reader {
        observations.extend(from_record_batch(&batch?)?);
    }
    Ok(observations)
}

/// Write observations to a CSV file, creating parent directories
pub fn write_csv_file(path: &Path, observations: &[PairObservation]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write_csv(file, observations)?;
    tracing::debug!(path = ?path, count = observations.len(), "Wrote observations to CSV");
    Ok(())
}
