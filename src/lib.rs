//! pairwatch: live pair-trading statistics for two Binance symbols
//!
//! This library provides the core components for:
//! - Real-time trade feeds from Binance with automatic reconnects
//! - Append-only tick storage in SQLite
//! - Resampling ticks into fixed-interval bars
//! - Rolling hedge ratio, spread, z-score and correlation
//! - Z-score threshold alerts
//! - CSV and Parquet export of pair observations
//! - Structured logging and Prometheus metrics

pub mod analytics;
pub mod cli;
pub mod config;
pub mod export;
pub mod feed;
pub mod pipeline;
pub mod store;
pub mod telemetry;
pub mod ws;
