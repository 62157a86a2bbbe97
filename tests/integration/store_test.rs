//! Integration tests for the tick store and recorder

use chrono::{Duration, TimeZone, Utc};
use pairwatch::feed::{Tick, TickSink};
use pairwatch::pipeline::TimeRange;
use pairwatch::store::{RecorderConfig, TickRecorder, TickStore};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_reader_sees_writer_appends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ticks.db");
    let start = Utc.timestamp_opt(1_704_067_200, 0).unwrap();

    let writer = TickStore::open(&path).unwrap();
    let reader = TickStore::open_read_only(&path).unwrap();
    assert!(reader.ticks("BTCUSDT", &TimeRange::all()).unwrap().is_empty());

    writer
        .append(&[
            Tick::new("BTCUSDT", 100.0, 1.0, start),
            Tick::new("BTCUSDT", 101.0, 1.0, start + Duration::seconds(1)),
        ])
        .unwrap();

    let ticks = reader.ticks("btcusdt", &TimeRange::all()).unwrap();
    assert_eq!(ticks.len(), 2);
    assert_eq!(
        reader.latest_timestamp(&["BTCUSDT"]).unwrap(),
        Some(start + Duration::seconds(1))
    );
}

#[test]
fn test_recorder_as_sink_from_many_tasks() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ticks.db");
    let start = Utc.timestamp_opt(1_704_067_200, 0).unwrap();

    let stats = runtime.block_on(async {
        let store = TickStore::open(&path).unwrap();
        let recorder = Arc::new(TickRecorder::new(
            store,
            RecorderConfig {
                buffer_size: 7,
                ..Default::default()
            },
        ));

        let mut tasks = Vec::new();
        for symbol in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
            let sink: Arc<dyn TickSink> = recorder.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    let tick = Tick::new(symbol, 1.0 + i as f64, 1.0, start + Duration::seconds(i));
                    sink.record(tick).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        recorder.shutdown().await
    });

    assert_eq!(stats.ticks_received, 150);
    assert_eq!(stats.ticks_written, 150);
    assert_eq!(stats.failed_flushes, 0);

    let store = TickStore::open_read_only(&path).unwrap();
    assert_eq!(store.symbols().unwrap(), vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    for symbol in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
        let ticks = store.ticks(symbol, &TimeRange::all()).unwrap();
        assert_eq!(ticks.len(), 50);
        assert!(ticks.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}

#[test]
fn test_read_only_open_of_missing_file_fails() {
    assert!(TickStore::open_read_only("/nonexistent/dir/ticks.db").is_err());
}

#[test]
fn test_range_since() {
    let store = TickStore::open_in_memory().unwrap();
    let start = Utc.timestamp_opt(1_704_067_200, 0).unwrap();
    let ticks: Vec<Tick> = (0..10)
        .map(|i| Tick::new("BTCUSDT", 100.0, 1.0, start + Duration::seconds(i)))
        .collect();
    tokio_test::assert_ok!(store.append(&ticks));

    let tail = store
        .ticks("BTCUSDT", &TimeRange::since(start + Duration::seconds(7)))
        .unwrap();
    assert_eq!(tail.len(), 3);

    let head = tokio_test::assert_ok!(
        store.ticks("BTCUSDT", &TimeRange::new(start, start + Duration::seconds(2)))
    );
    assert_eq!(head.len(), 2);
}
