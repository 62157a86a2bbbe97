//! Observation export
//!
//! Observations are converted to a single Arrow record batch, which is then
//! written as CSV or Parquet.

mod csv;
mod parquet;

pub use self::csv::{read_csv, write_csv, write_csv_file};
pub use self::parquet::{read_parquet, write_parquet};

use crate::analytics::PairObservation;
use arrow::array::{Array, ArrayRef, Float64Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Timezone tag on the timestamp column
///
/// Offset form, so readers without a timezone database can parse it.
const UTC_OFFSET: &str = "+00:00";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema mismatch: {0}")]
    Schema(String),
}

/// Column layout shared by every export format
pub fn observation_schema() -> SchemaRef {
    let ts = DataType::Timestamp(TimeUnit::Millisecond, Some(UTC_OFFSET.into()));
    Arc::new(Schema::new(vec![
        Field::new("interval_start", ts, false),
        Field::new("price_a", DataType::Float64, false),
        Field::new("price_b", DataType::Float64, false),
        Field::new("hedge_ratio", DataType::Float64, true),
        Field::new("spread", DataType::Float64, true),
        Field::new("z_score", DataType::Float64, true),
        Field::new("correlation", DataType::Float64, true),
    ]))
}

/// Observations → record batch; undefined statistics become nulls
pub fn to_record_batch(observations: &[PairObservation]) -> Result<RecordBatch, ExportError> {
    let starts: Vec<i64> = observations
        .iter()
        .map(|o| o.interval_start.timestamp_millis())
        .collect();
    let column = |f: fn(&PairObservation) -> Option<f64>| -> ArrayRef {
        Arc::new(Float64Array::from(
            observations.iter().map(f).collect::<Vec<Option<f64>>>(),
        ))
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampMillisecondArray::from(starts).with_timezone(UTC_OFFSET)),
        column(|o| Some(o.price_a)),
        column(|o| Some(o.price_b)),
        column(|o| o.hedge_ratio),
        column(|o| o.spread),
        column(|o| o.z_score),
        column(|o| o.correlation),
    ];

    Ok(RecordBatch::try_new(observation_schema(), columns)?)
}

/// Record batch → observations; nulls become `None`
pub fn from_record_batch(batch: &RecordBatch) -> Result<Vec<PairObservation>, ExportError> {
    if batch.num_columns() != observation_schema().fields().len() {
        return Err(ExportError::Schema(format!(
            "expected {} columns, found {}",
            observation_schema().fields().len(),
            batch.num_columns()
        )));
    }

    let starts = batch
        .column(0)
        .as_any()
        .downcast_ref::<TimestampMillisecondArray>()
        .ok_or_else(|| ExportError::Schema("interval_start is not a millisecond timestamp".into()))?;
    let floats = (1..7)
        .map(|i| {
            batch
                .column(i)
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| ExportError::Schema(format!("column {} is not Float64", i)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let get = |col: &Float64Array, row: usize| (!col.is_null(row)).then(|| col.value(row));

    let mut observations = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let ms = starts.value(row);
        let interval_start = Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| ExportError::Schema(format!("timestamp out of range: {}", ms)))?;
        let price_a = get(floats[0], row)
            .ok_or_else(|| ExportError::Schema("price_a is null".into()))?;
        let price_b = get(floats[1], row)
            .ok_or_else(|| ExportError::Schema("price_b is null".into()))?;

        observations.push(PairObservation {
            interval_start,
            price_a,
            price_b,
            hedge_ratio: get(floats[2], row),
            spread: get(floats[3], row),
            z_score: get(floats[4], row),
            correlation: get(floats[5], row),
        });
    }

    Ok(observations)
}
