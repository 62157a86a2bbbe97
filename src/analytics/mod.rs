//! Pair analytics
//!
//! Resampling, hedge ratio estimation, spread statistics and alert
//! evaluation. Everything here is pure and synchronous: inputs are slices
//! of ticks or bars, outputs are fresh vectors.

pub mod alert;
pub mod pair;
pub mod resample;
pub mod stats;

pub use alert::{Alert, AlertEvaluator, AlertLog, Direction, DEFAULT_Z_THRESHOLD};
pub use pair::{PairObservation, PairStatsEngine, RefitPolicy};
pub use resample::{resample, Bar, Interval};

use thiserror::Error;

/// Invalid analytics parameters
#[derive(Debug, Error, PartialEq)]
pub enum AnalyticsError {
    #[error("Rolling window must be at least 2 bars, got {0}")]
    InvalidWindow(usize),

    #[error("Z-score threshold must be positive and finite, got {0}")]
    InvalidThreshold(f64),

    #[error("Periodic refit cadence must be at least 1 bar")]
    InvalidRefit,

    #[error("Unsupported interval '{0}' (expected 1s, 1m or 5m)")]
    InvalidInterval(String),

    #[error("Pair legs must be two different symbols, got {0} twice")]
    SameSymbol(String),
}
