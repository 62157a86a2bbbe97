//! Tick storage
//!
//! Append-only SQLite table of trade ticks plus the buffered recorder that
//! is its only writer.

mod recorder;
mod sqlite;

pub use recorder::{RecorderConfig, RecorderStats, TickRecorder};
pub use sqlite::TickStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored timestamp out of range: {0} ms")]
    InvalidTimestamp(i64),

    #[error("Store connection lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
