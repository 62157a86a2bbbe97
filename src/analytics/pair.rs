//! Pair statistics: hedge ratio, spread, z-score, rolling correlation

use super::resample::{Bar, Interval};
use super::stats::{ols, pearson, z_score};
use super::AnalyticsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// When the hedge ratio is re-estimated
///
/// Every fit uses the W aligned observations ending at the current bar,
/// never later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RefitPolicy {
    /// Refit on every observation. A degenerate window leaves β undefined.
    #[default]
    Rolling,
    /// Refit on bars whose epoch ordinal ([`Interval::ordinal`]) is a
    /// multiple of `every`, once the window is full.
    ///
    /// Refit points belong to the bar grid, not to the query range, so two
    /// overlapping ranges agree on β wherever both define it. Between refits
    /// the last β is reused; a degenerate refit or a missing boundary bar
    /// keeps it. A stale β lags regime changes, so the spread of bars far
    /// from the last fit carries that lag.
    Periodic { every: usize },
}

/// Pair statistics for one aligned bar timestamp
///
/// `None` marks a statistic that is undefined at this point: not enough
/// history for a full window, or zero variance inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairObservation {
    pub interval_start: DateTime<Utc>,
    pub price_a: f64,
    pub price_b: f64,
    /// OLS slope of price_a on price_b
    pub hedge_ratio: Option<f64>,
    /// price_a − hedge_ratio · price_b
    pub spread: Option<f64>,
    pub z_score: Option<f64>,
    pub correlation: Option<f64>,
}

/// Two bars sharing an interval_start
#[derive(Debug, Clone, Copy)]
struct Aligned {
    interval: Interval,
    start: DateTime<Utc>,
    price_a: f64,
    price_b: f64,
}

/// Computes [`PairObservation`]s from two bar series
#[derive(Debug, Clone)]
pub struct PairStatsEngine {
    window: usize,
    refit: RefitPolicy,
}

impl PairStatsEngine {
    /// Create an engine with a rolling window of `window` bars (at least 2)
    pub fn new(window: usize, refit: RefitPolicy) -> Result<Self, AnalyticsError> {
        if window < 2 {
            return Err(AnalyticsError::InvalidWindow(window));
        }
        if let RefitPolicy::Periodic { every: 0 } = refit {
            return Err(AnalyticsError::InvalidRefit);
        }
        Ok(Self { window, refit })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn refit(&self) -> RefitPolicy {
        self.refit
    }

    /// Compute one observation per interval_start present in both series
    ///
    /// Bars only in one series are dropped. Inputs need not be sorted.
    pub fn compute(&self, bars_a: &[Bar], bars_b: &[Bar]) -> Vec<PairObservation> {
        let aligned = align(bars_a, bars_b);
        let w = self.window;

        let prices_a: Vec<f64> = aligned.iter().map(|row| row.price_a).collect();
        let prices_b: Vec<f64> = aligned.iter().map(|row| row.price_b).collect();

        let mut observations = Vec::with_capacity(aligned.len());
        let mut spreads: Vec<Option<f64>> = Vec::with_capacity(aligned.len());
        let mut beta: Option<f64> = None;

        for (t, row) in aligned.iter().enumerate() {
            let full = t + 1 >= w;
            let lo = (t + 1).saturating_sub(w);
            let win_a = &prices_a[lo..=t];
            let win_b = &prices_b[lo..=t];

            if full {
                let slope = || ols(win_b, win_a).map(|fit| fit.slope);
                match self.refit {
                    RefitPolicy::Rolling => beta = slope(),
                    RefitPolicy::Periodic { every } if on_refit_grid(row, every) => {
                        beta = slope().or(beta);
                    }
                    RefitPolicy::Periodic { .. } => {}
                }
            }

            let spread = beta
                .map(|b| row.price_a - b * row.price_b)
                .filter(|s| s.is_finite());
            spreads.push(spread);

            let z = if full {
                spreads[lo..=t]
                    .iter()
                    .copied()
                    .collect::<Option<Vec<f64>>>()
                    .and_then(|window| z_score(&window))
            } else {
                None
            };

            let correlation = if full { pearson(win_a, win_b) } else { None };

            observations.push(PairObservation {
                interval_start: row.start,
                price_a: row.price_a,
                price_b: row.price_b,
                hedge_ratio: beta,
                spread,
                z_score: z,
                correlation,
            });
        }

        observations
    }
}

fn on_refit_grid(row: &Aligned, every: usize) -> bool {
    let every = i64::try_from(every).unwrap_or(i64::MAX);
    row.interval.ordinal(row.start).rem_euclid(every) == 0
}

/// Inner join on interval_start, ascending
fn align(bars_a: &[Bar], bars_b: &[Bar]) -> Vec<Aligned> {
    let by_start: HashMap<DateTime<Utc>, f64> = bars_b
        .iter()
        .map(|bar| (bar.interval_start, bar.close_price))
        .collect();

    let mut aligned: Vec<Aligned> = bars_a
        .iter()
        .filter_map(|bar| {
            by_start.get(&bar.interval_start).map(|price_b| Aligned {
                interval: bar.interval,
                start: bar.interval_start,
                price_a: bar.close_price,
                price_b: *price_b,
            })
        })
        .collect();
    aligned.sort_by_key(|row| row.start);
    aligned.dedup_by_key(|row| row.start);
    aligned
}
