//! Parquet export

use super::{from_record_batch, to_record_batch, ExportError};
use crate::analytics::PairObservation;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;

/// Write observations to a SNAPPY-compressed Parquet file
pub fn write_parquet(path: &Path, observations: &[PairObservation]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let batch = to_record_batch(observations)?;
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!(path = ?path, count = observations.len(), "Wrote observations to Parquet");
    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<Vec<PairObservation>, ExportError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut observations = Vec::new();
    for batch in reader {
        observations.extend(from_record_batch(&batch?)?);
    }
    Ok(observations)
}
