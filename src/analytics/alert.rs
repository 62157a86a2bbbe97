//! Z-score threshold alerts

use super::pair::PairObservation;
use super::AnalyticsError;
use crate::feed::normalize_symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;

/// Alerts kept by an [`AlertLog`] unless configured otherwise
pub const DEFAULT_ALERT_HISTORY: usize = 100;

/// Side of the spread excursion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Spread rich relative to its window (z > 0)
    Up,
    /// Spread cheap relative to its window (z < 0)
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Leg regressed on the other (price_a)
    pub symbol_a: String,
    pub symbol_b: String,
    pub timestamp: DateTime<Utc>,
    pub z_score: f64,
    pub direction: Direction,
}

/// Flags observations whose |z| strictly exceeds a threshold
///
/// Every qualifying observation yields an alert; consecutive breaches are
/// not merged. Alerts carry the pair set with [`AlertEvaluator::for_pair`].
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    threshold: f64,
    symbol_a: String,
    symbol_b: String,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_Z_THRESHOLD,
            symbol_a: String::new(),
            symbol_b: String::new(),
        }
    }
}

impl AlertEvaluator {
    pub fn new(threshold: f64) -> Result<Self, AnalyticsError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(AnalyticsError::InvalidThreshold(threshold));
        }
        Ok(Self {
            threshold,
            ..Default::default()
        })
    }

    /// Label alerts with the two legs of the pair
    pub fn for_pair(mut self, symbol_a: &str, symbol_b: &str) -> Self {
        self.symbol_a = normalize_symbol(symbol_a);
        self.symbol_b = normalize_symbol(symbol_b);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Alert for a single observation, if it breaches
    pub fn check(&self, observation: &PairObservation) -> Option<Alert> {
        let z = observation.z_score?;
        if z.abs() <= self.threshold {
            return None;
        }
        Some(Alert {
            symbol_a: self.symbol_a.clone(),
            symbol_b: self.symbol_b.clone(),
            timestamp: observation.interval_start,
            z_score: z,
            direction: if z > 0.0 { Direction::Up } else { Direction::Down },
        })
    }

    /// Alerts in observation order
    pub fn evaluate(&self, observations: &[PairObservation]) -> Vec<Alert> {
        observations.iter().filter_map(|o| self.check(o)).collect()
    }
}

/// Recent alerts accumulated across refreshes
///
/// Refreshes recompute overlapping history, so the same bar can breach on
/// every pass. The log only accepts alerts later than the newest one it has
/// seen, and keeps the last `capacity` of them.
#[derive(Debug)]
pub struct AlertLog {
    recent: VecDeque<Alert>,
    capacity: usize,
    newest: Option<DateTime<Utc>>,
    total: u64,
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ALERT_HISTORY)
    }
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            recent: VecDeque::new(),
            capacity,
            newest: None,
            total: 0,
        }
    }

    /// Append unseen alerts and return them
    pub fn record(&mut self, alerts: &[Alert]) -> Vec<Alert> {
        let fresh: Vec<Alert> = alerts
            .iter()
            .filter(|a| self.newest.map_or(true, |n| a.timestamp > n))
            .cloned()
            .collect();

        for alert in &fresh {
            self.newest = Some(self.newest.map_or(alert.timestamp, |n| n.max(alert.timestamp)));
            if self.recent.len() == self.capacity {
                self.recent.pop_front();
            }
            self.recent.push_back(alert.clone());
        }
        self.total += fresh.len() as u64;
        fresh
    }

    /// Retained alerts, oldest first
    pub fn recent(&self) -> impl Iterator<Item = &Alert> {
        self.recent.iter()
    }

    pub fn latest(&self) -> Option<&Alert> {
        self.recent.back()
    }

    /// Alerts currently retained
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Alerts recorded over the life of the log, evicted ones included
    pub fn total(&self) -> u64 {
        self.total
    }
}
