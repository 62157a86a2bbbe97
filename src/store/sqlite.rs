//! SQLite tick store

use super::StoreError;
use crate::feed::{normalize_symbol, Tick};
use crate::pipeline::TimeRange;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS ticks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        price REAL NOT NULL,
        size REAL NOT NULL,
        ts_ms INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_ticks_symbol_ts ON ticks(symbol, ts_ms);
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the tick database
///
/// Cloning shares the underlying connection. Writers should go through a
/// single [`super::TickRecorder`]; readers open their own handle with
/// [`TickStore::open_read_only`] so they never contend for the write lock.
#[derive(Clone)]
pub struct TickStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for TickStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickStore").finish_non_exhaustive()
    }
}

impl TickStore {
    /// Open (creating if needed) a database file in WAL mode
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!(path = %path.display(), "Tick store opened");
        Ok(Self::from_connection(conn))
    }

    /// Open an existing database for queries only
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "query_only", "ON")?;
        Ok(Self::from_connection(conn))
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Append a batch of ticks in one transaction
    ///
    /// Either every tick is persisted or none is.
    pub fn append(&self, ticks: &[Tick]) -> Result<usize, StoreError> {
        if ticks.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO ticks (symbol, price, size, ts_ms) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for tick in ticks {
                stmt.execute(params![
                    tick.symbol,
                    tick.price,
                    tick.size,
                    tick.timestamp.timestamp_millis()
                ])?;
            }
        }
        tx.commit()?;

        Ok(ticks.len())
    }

    /// Ticks for `symbol` inside `range`, ascending by timestamp then insertion
    pub fn ticks(&self, symbol: &str, range: &TimeRange) -> Result<Vec<Tick>, StoreError> {
        let symbol = normalize_symbol(symbol);
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT symbol, price, size, ts_ms FROM ticks
             WHERE symbol = ?1 AND ts_ms >= ?2 AND ts_ms < ?3
             ORDER BY ts_ms, id",
        )?;

        let rows = stmt.query_map(
            params![
                symbol,
                range.start.timestamp_millis(),
                range.end.timestamp_millis()
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;

        let mut ticks = Vec::new();
        for row in rows {
            let (symbol, price, size, ts_ms) = row?;
            ticks.push(Tick {
                symbol,
                price,
                size,
                timestamp: from_millis(ts_ms)?,
            });
        }
        Ok(ticks)
    }

    /// Timestamp of the newest tick for any of `symbols` (all symbols if empty)
    pub fn latest_timestamp(&self, symbols: &[&str]) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.lock()?;
        let mut latest: Option<i64> = None;

        if symbols.is_empty() {
            latest = conn.query_row("SELECT MAX(ts_ms) FROM ticks", [], |row| row.get(0))?;
        } else {
            let mut stmt = conn.prepare_cached("SELECT MAX(ts_ms) FROM ticks WHERE symbol = ?1")?;
            for symbol in symbols {
                let ts: Option<i64> =
                    stmt.query_row(params![normalize_symbol(symbol)], |row| row.get(0))?;
                latest = latest.max(ts);
            }
        }

        latest.map(from_millis).transpose()
    }

    /// Number of stored ticks for `symbol`
    pub fn count(&self, symbol: &str) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ticks WHERE symbol = ?1",
            params![normalize_symbol(symbol)],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as u64)
    }

    /// Distinct symbols present, sorted
    pub fn symbols(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached("SELECT DISTINCT symbol FROM ticks ORDER BY symbol")?;
        let symbols = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(symbols)
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(StoreError::InvalidTimestamp(ms))
}
