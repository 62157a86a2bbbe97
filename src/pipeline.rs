//! Refresh pipeline and query interface
//!
//! A refresh is a pure function of the ticks it is given: resample both
//! legs, compute pair statistics, evaluate alerts. [`QueryService`] runs the
//! same steps on ticks read from a [`TickStore`].

use crate::analytics::{
    resample, Alert, AlertEvaluator, AnalyticsError, Bar, Interval, PairObservation,
    PairStatsEngine, RefitPolicy, DEFAULT_Z_THRESHOLD,
};
use crate::feed::{normalize_symbol, Tick};
use crate::store::{StoreError, TickStore};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Everything representable
    pub fn all() -> Self {
        Self::new(DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
    }

    /// From `start` onwards
    pub fn since(start: DateTime<Utc>) -> Self {
        Self::new(start, DateTime::<Utc>::MAX_UTC)
    }

    /// The `lookback` span before `now`, including `now` itself
    pub fn trailing(now: DateTime<Utc>, lookback: Duration) -> Self {
        let end = now
            .checked_add_signed(Duration::milliseconds(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let start = now
            .checked_sub_signed(lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::new(start, end)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Parameters of one pair computation
#[derive(Debug, Clone, PartialEq)]
pub struct PairRequest {
    /// Leg A, the regressed side
    pub symbol_a: String,
    pub symbol_b: String,
    pub interval: Interval,
    pub window: usize,
    pub refit: RefitPolicy,
    pub threshold: f64,
}

impl PairRequest {
    /// Request with the default refit policy and threshold
    pub fn new(symbol_a: &str, symbol_b: &str, interval: Interval, window: usize) -> Self {
        Self {
            symbol_a: normalize_symbol(symbol_a),
            symbol_b: normalize_symbol(symbol_b),
            interval,
            window,
            refit: RefitPolicy::default(),
            threshold: DEFAULT_Z_THRESHOLD,
        }
    }

    pub fn refit(mut self, refit: RefitPolicy) -> Self {
        self.refit = refit;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Check every parameter, returning the request unchanged when valid
    pub fn validate(self) -> Result<Self, AnalyticsError> {
        if self.symbol_a == self.symbol_b {
            return Err(AnalyticsError::SameSymbol(self.symbol_a));
        }
        PairStatsEngine::new(self.window, self.refit)?;
        AlertEvaluator::new(self.threshold)?;
        Ok(self)
    }

    fn engine(&self) -> Result<PairStatsEngine, AnalyticsError> {
        PairStatsEngine::new(self.window, self.refit)
    }

    fn evaluator(&self) -> Result<AlertEvaluator, AnalyticsError> {
        Ok(AlertEvaluator::new(self.threshold)?.for_pair(&self.symbol_a, &self.symbol_b))
    }
}

/// Output of one refresh pass
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub bars_a: Vec<Bar>,
    pub bars_b: Vec<Bar>,
    pub observations: Vec<PairObservation>,
    pub alerts: Vec<Alert>,
    /// Newest tick of either leg
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Most recent observation, defined or not
    pub fn latest(&self) -> Option<&PairObservation> {
        self.observations.last()
    }

    /// Most recent observation with a defined z-score
    pub fn latest_defined(&self) -> Option<&PairObservation> {
        self.observations.iter().rev().find(|o| o.z_score.is_some())
    }
}

/// Recompute bars, observations and alerts from `ticks`
///
/// Ticks of symbols other than the two legs are ignored.
pub fn refresh(ticks: &[Tick], request: &PairRequest) -> Result<Snapshot, AnalyticsError> {
    let engine = request.engine()?;
    let evaluator = request.evaluator()?;

    let bars_a = resample(&request.symbol_a, ticks, request.interval);
    let bars_b = resample(&request.symbol_b, ticks, request.interval);
    let observations = engine.compute(&bars_a, &bars_b);
    let alerts = evaluator.evaluate(&observations);

    let last_tick_at = ticks
        .iter()
        .filter(|t| t.symbol == request.symbol_a || t.symbol == request.symbol_b)
        .map(|t| t.timestamp)
        .max();

    Ok(Snapshot {
        bars_a,
        bars_b,
        observations,
        alerts,
        last_tick_at,
    })
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

/// Read-side interface over a tick store
///
/// Every method is blocking; call from `spawn_blocking` in async code.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: TickStore,
}

impl QueryService {
    pub fn new(store: TickStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TickStore {
        &self.store
    }

    pub fn get_ticks(&self, symbol: &str, range: &TimeRange) -> Result<Vec<Tick>, QueryError> {
        Ok(self.store.ticks(symbol, range)?)
    }

    pub fn get_bars(
        &self,
        symbol: &str,
        range: &TimeRange,
        interval: Interval,
    ) -> Result<Vec<Bar>, QueryError> {
        let ticks = self.store.ticks(symbol, range)?;
        Ok(resample(symbol, &ticks, interval))
    }

    /// Observations with the default refit policy
    pub fn get_pair_observations(
        &self,
        symbol_a: &str,
        symbol_b: &str,
        range: &TimeRange,
        interval: Interval,
        window: usize,
    ) -> Result<Vec<PairObservation>, QueryError> {
        let request = PairRequest::new(symbol_a, symbol_b, interval, window).validate()?;
        Ok(self.snapshot(&request, range)?.observations)
    }

    pub fn get_alerts(
        &self,
        symbol_a: &str,
        symbol_b: &str,
        range: &TimeRange,
        interval: Interval,
        window: usize,
        threshold: f64,
    ) -> Result<Vec<Alert>, QueryError> {
        let request = PairRequest::new(symbol_a, symbol_b, interval, window)
            .threshold(threshold)
            .validate()?;
        Ok(self.snapshot(&request, range)?.alerts)
    }

    /// Full refresh over the ticks stored in `range`
    pub fn snapshot(&self, request: &PairRequest, range: &TimeRange) -> Result<Snapshot, QueryError> {
        let mut ticks = self.store.ticks(&request.symbol_a, range)?;
        ticks.extend(self.store.ticks(&request.symbol_b, range)?);
        Ok(refresh(&ticks, request)?)
    }

    /// Newest stored tick for either leg of `request`
    pub fn last_tick_at(&self, request: &PairRequest) -> Result<Option<DateTime<Utc>>, QueryError> {
        Ok(self
            .store
            .latest_timestamp(&[request.symbol_a.as_str(), request.symbol_b.as_str()])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Direction;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_704_067_200 + secs, 0).unwrap()
    }

    /// Two legs where A tracks 2·B with a shock on the last bar
    fn shocked_pair(n: i64) -> Vec<Tick> {
        let mut ticks = Vec::new();
        for i in 0..n {
            let b = 50.0 + (i as f64 * 0.7).sin();
            let noise = if i % 2 == 0 { 0.01 } else { -0.01 };
            let shock = if i == n - 1 { 5.0 } else { 0.0 };
            ticks.push(Tick::new("ETHUSDT", b, 1.0, at(i)));
            ticks.push(Tick::new("BTCUSDT", 2.0 * b + noise + shock, 1.0, at(i)));
        }
        ticks
    }

    #[test]
    fn test_request_normalizes_and_validates() {
        let request = PairRequest::new("btcusdt", " ethusdt", Interval::OneSecond, 5)
            .validate()
            .unwrap();
        assert_eq!(request.symbol_a, "BTCUSDT");
        assert_eq!(request.symbol_b, "ETHUSDT");
        assert_eq!(request.refit, RefitPolicy::Rolling);
        assert_eq!(request.threshold, 2.0);

        assert!(matches!(
            PairRequest::new("a", "b", Interval::OneSecond, 1).validate(),
            Err(AnalyticsError::InvalidWindow(1))
        ));
        assert!(matches!(
            PairRequest::new("a", "b", Interval::OneSecond, 5).threshold(0.0).validate(),
            Err(AnalyticsError::InvalidThreshold(_))
        ));
        assert!(matches!(
            PairRequest::new("btcusdt", "BTCUSDT", Interval::OneSecond, 5).validate(),
            Err(AnalyticsError::SameSymbol(_))
        ));
    }

    #[test]
    fn test_refresh_produces_alert_on_shock() {
        let ticks = shocked_pair(30);
        // Single refit at 00:00:20 on calm bars so the shock lands in the spread
        let request = PairRequest::new("BTCUSDT", "ETHUSDT", Interval::OneSecond, 10)
            .refit(RefitPolicy::Periodic { every: 20 });

        let snapshot = refresh(&ticks, &request).unwrap();
        assert_eq!(snapshot.bars_a.len(), 30);
        assert_eq!(snapshot.observations.len(), 30);
        assert_eq!(snapshot.last_tick_at, Some(at(29)));

        let last = snapshot.latest().unwrap();
        assert!(last.z_score.unwrap() > 2.0);
        let alert = snapshot.alerts.last().unwrap();
        assert_eq!(alert.timestamp, at(29));
        assert_eq!(alert.direction, Direction::Up);
    }

    #[test]
    fn test_refresh_is_deterministic() {
        let ticks = shocked_pair(25);
        let request = PairRequest::new("BTCUSDT", "ETHUSDT", Interval::OneSecond, 5);
        assert_eq!(
            refresh(&ticks, &request).unwrap(),
            refresh(&ticks, &request).unwrap()
        );
    }

    #[test]
    fn test_refresh_missing_leg_is_empty() {
        let ticks: Vec<Tick> = (0..10).map(|i| Tick::new("BTCUSDT", 100.0, 1.0, at(i))).collect();
        let request = PairRequest::new("BTCUSDT", "ETHUSDT", Interval::OneSecond, 3);

        let snapshot = refresh(&ticks, &request).unwrap();
        assert_eq!(snapshot.bars_a.len(), 10);
        assert!(snapshot.bars_b.is_empty());
        assert!(snapshot.observations.is_empty());
        assert!(snapshot.alerts.is_empty());
        assert!(snapshot.latest_defined().is_none());
    }

    #[test]
    fn test_time_range() {
        let range = TimeRange::new(at(0), at(10));
        assert!(range.contains(at(0)));
        assert!(range.contains(at(9)));
        assert!(!range.contains(at(10)));

        let trailing = TimeRange::trailing(at(100), Duration::seconds(10));
        assert!(trailing.contains(at(100)));
        assert!(trailing.contains(at(90)));
        assert!(!trailing.contains(at(89)));

        assert!(TimeRange::all().contains(at(0)));
    }

    #[test]
    fn test_query_service_matches_pure_refresh() {
        let ticks = shocked_pair(30);
        let store = TickStore::open_in_memory().unwrap();
        store.append(&ticks).unwrap();
        let service = QueryService::new(store);

        let request = PairRequest::new("BTCUSDT", "ETHUSDT", Interval::OneSecond, 10);
        let expected = refresh(&ticks, &request).unwrap();
        let range = TimeRange::all();

        assert_eq!(service.snapshot(&request, &range).unwrap(), expected);
        assert_eq!(
            service
                .get_pair_observations("btcusdt", "ethusdt", &range, Interval::OneSecond, 10)
                .unwrap(),
            expected.observations
        );
        assert_eq!(
            service
                .get_alerts("BTCUSDT", "ETHUSDT", &range, Interval::OneSecond, 10, 2.0)
                .unwrap(),
            expected.alerts
        );
        assert_eq!(service.get_ticks("BTCUSDT", &range).unwrap().len(), 30);
        assert_eq!(
            service
                .get_bars("ETHUSDT", &range, Interval::OneSecond)
                .unwrap(),
            expected.bars_b
        );
        assert_eq!(service.last_tick_at(&request).unwrap(), Some(at(29)));
    }

    #[test]
    fn test_query_service_rejects_bad_window() {
        let service = QueryService::new(TickStore::open_in_memory().unwrap());
        let result = service.get_pair_observations(
            "BTCUSDT",
            "ETHUSDT",
            &TimeRange::all(),
            Interval::OneMinute,
            0,
        );
        assert!(matches!(
            result,
            Err(QueryError::Analytics(AnalyticsError::InvalidWindow(0)))
        ));
    }
}
