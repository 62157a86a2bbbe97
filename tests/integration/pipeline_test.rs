//! Integration tests for the analytics pipeline

use chrono::{DateTime, Duration, TimeZone, Utc};
use pairwatch::analytics::{
    resample, AlertEvaluator, AlertLog, Interval, PairStatsEngine, RefitPolicy,
};
use pairwatch::feed::Tick;
use pairwatch::pipeline::{refresh, PairRequest};

fn start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0).unwrap()
}

/// Four trades per second; the true hedge ratio steps from 18 to 19 halfway
fn market(secs: i64) -> Vec<Tick> {
    let mut ticks = Vec::new();
    for i in 0..secs * 4 {
        let ts = start() + Duration::milliseconds(i * 250);
        let b = 2_250.0 + (i as f64 * 0.05).sin() * 20.0;
        let beta = if i < secs * 2 { 18.0 } else { 19.0 };
        let a = beta * b + (i as f64 * 0.9).cos() * 5.0;
        ticks.push(Tick::new("ethusdt", b, 0.3, ts));
        ticks.push(Tick::new("btcusdt", a, 0.02, ts));
    }
    ticks
}

#[test]
fn test_minute_bars_from_second_ticks() {
    let ticks = market(600);
    let bars = resample("BTCUSDT", &ticks, Interval::OneMinute);
    assert_eq!(bars.len(), 10);
    assert!(bars.iter().all(|b| b.trade_count == 240));
    assert!(bars
        .windows(2)
        .all(|w| w[1].interval_start - w[0].interval_start == Duration::minutes(1)));

    let five = resample("BTCUSDT", &ticks, Interval::FiveMinutes);
    assert_eq!(five.len(), 2);
    let size: f64 = five.iter().map(|b| b.total_size).sum();
    assert!((size - 0.02 * 2_400.0).abs() < 1e-9);
}

#[test]
fn test_observation_definedness_boundaries() {
    let ticks = market(120);
    let window = 15;
    let request = PairRequest::new("BTCUSDT", "ETHUSDT", Interval::OneSecond, window);
    let snapshot = refresh(&ticks, &request).unwrap();
    let obs = &snapshot.observations;

    assert_eq!(obs.len(), 120);
    for (t, o) in obs.iter().enumerate() {
        assert_eq!(o.hedge_ratio.is_some(), t + 1 >= window, "beta at {t}");
        assert_eq!(o.correlation.is_some(), t + 1 >= window, "corr at {t}");
        assert_eq!(o.z_score.is_some(), t + 2 >= 2 * window, "z at {t}");
    }
}

#[test]
fn test_rolling_hedge_ratio_follows_regime_change() {
    let ticks = market(300);
    let bars_a = resample("BTCUSDT", &ticks, Interval::OneSecond);
    let bars_b = resample("ETHUSDT", &ticks, Interval::OneSecond);
    let engine = PairStatsEngine::new(60, RefitPolicy::Rolling).unwrap();

    let obs = engine.compute(&bars_a, &bars_b);
    let early = obs[59].hedge_ratio.unwrap();
    let late = obs[299].hedge_ratio.unwrap();
    assert!((early - 18.0).abs() < 0.5, "early beta {early}");
    assert!((late - 19.0).abs() < 0.5, "late beta {late}");
}

#[test]
fn test_alert_log_across_overlapping_refreshes() {
    let ticks = market(200);
    let request = PairRequest::new("BTCUSDT", "ETHUSDT", Interval::OneSecond, 10).threshold(1.5);
    let evaluator = AlertEvaluator::new(1.5).unwrap().for_pair("BTCUSDT", "ETHUSDT");
    let mut log = AlertLog::with_capacity(1_000);

    let mut reported = 0;
    for end in [100, 150, 200] {
        let cutoff = start() + Duration::seconds(end);
        let visible: Vec<Tick> = ticks.iter().filter(|t| t.timestamp < cutoff).cloned().collect();
        let snapshot = refresh(&visible, &request).unwrap();
        assert_eq!(snapshot.alerts, evaluator.evaluate(&snapshot.observations));
        reported += log.record(&snapshot.alerts).len();
    }

    let full = refresh(&ticks, &request).unwrap();
    assert_eq!(reported, full.alerts.len());
    assert_eq!(log.total(), full.alerts.len() as u64);
    assert!(log.recent().eq(full.alerts.iter()));
    assert!(full.alerts.iter().all(|a| a.symbol_a == "BTCUSDT" && a.symbol_b == "ETHUSDT"));
}
