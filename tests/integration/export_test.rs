//! Integration tests for observation export

use chrono::{Duration, TimeZone, Utc};
use pairwatch::analytics::Interval;
use pairwatch::export::{read_csv, read_parquet, write_csv, write_csv_file, write_parquet};
use pairwatch::feed::Tick;
use pairwatch::pipeline::{refresh, PairRequest};
use std::fs::File;
use tempfile::TempDir;

fn observations() -> Vec<pairwatch::analytics::PairObservation> {
    let start = Utc.timestamp_opt(1_704_067_200, 0).unwrap();
    let ticks: Vec<Tick> = (0..40)
        .flat_map(|i| {
            let ts = start + Duration::seconds(i);
            let b = 2_250.0 + (i as f64 * 0.4).sin() * 10.0;
            let a = 18.5 * b + (i as f64 * 1.3).cos() * 3.0;
            [Tick::new("BTCUSDT", a, 0.01, ts), Tick::new("ETHUSDT", b, 0.5, ts)]
        })
        .collect();
    let request = PairRequest::new("BTCUSDT", "ETHUSDT", Interval::OneSecond, 8);
    refresh(&ticks, &request).unwrap().observations
}

#[test]
fn test_csv_round_trip_of_pipeline_output() {
    let observations = observations();
    // Warm-up rows carry undefined statistics
    assert!(observations[0].hedge_ratio.is_none());
    assert!(observations.last().unwrap().z_score.is_some());

    let mut buf = Vec::new();
    write_csv(&mut buf, &observations).unwrap();
    assert_eq!(read_csv(buf.as_slice()).unwrap(), observations);
}

#[test]
fn test_csv_and_parquet_files_agree() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("export").join("pair.csv");
    let parquet = dir.path().join("export").join("pair.parquet");
    let observations = observations();

    write_csv_file(&csv, &observations).unwrap();
    write_parquet(&parquet, &observations).unwrap();

    let from_csv = read_csv(File::open(&csv).unwrap()).unwrap();
    let from_parquet = read_parquet(&parquet).unwrap();
    assert_eq!(from_csv, from_parquet);
    assert_eq!(from_parquet.len(), 40);
}
