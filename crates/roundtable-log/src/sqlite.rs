use std::sync::Mutex;

use roundtable_models::discussion::{DiscussionRow, DISCUSSION_TABLE_DDL};
use rusqlite::{Connection, Row};
use tracing::debug;

use crate::error::LogError;
use crate::SessionLog;

const SELECT_COLUMNS: &str = "session_id, symbol, depth, round1_json, round2_json, decision_json, \
     decision_source, consensus_level, action, total_duration_ms, timings_json, created_at";

/// SQLite-backed discussion log.
///
/// Rows are only ever inserted; a second write for the same session id fails
/// instead of replacing the first. Access is serialized through a `Mutex`
/// since `rusqlite::Connection` is not `Sync`.
pub struct SqliteDiscussionLog {
    conn: Mutex<Connection>,
}

impl SqliteDiscussionLog {
    /// Open (or create) the log file. Creates the schema and enables WAL.
    pub fn open(path: &str) -> Result<Self, LogError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(DISCUSSION_TABLE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, LogError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(DISCUSSION_TABLE_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, LogError> {
        self.conn
            .lock()
            .map_err(|e| LogError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }

    /// Insert one session row. Fails on a duplicate session id.
    pub fn insert(&self, row: &DiscussionRow) -> Result<(), LogError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO discussion_log \
             (session_id, symbol, depth, round1_json, round2_json, decision_json, \
              decision_source, consensus_level, action, total_duration_ms, timings_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                row.session_id,
                row.symbol,
                row.depth,
                row.round1_json,
                row.round2_json,
                row.decision_json,
                row.decision_source,
                row.consensus_level,
                row.action,
                row.total_duration_ms as i64,
                row.timings_json,
                row.created_at,
            ],
        )?;
        debug!(session_id = %row.session_id, symbol = %row.symbol, "Discussion row written");
        Ok(())
    }

    /// Get a single session by id.
    pub fn get(&self, session_id: &str) -> Result<Option<DiscussionRow>, LogError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SELECT_COLUMNS} FROM discussion_log WHERE session_id = ?1"
        ))?;

        match stmt.query_row(rusqlite::params![session_id], map_row) {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(LogError::Sqlite(e)),
        }
    }

    /// Most recent sessions for a symbol, newest first.
    pub fn recent(&self, symbol: &str, limit: usize) -> Result<Vec<DiscussionRow>, LogError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SELECT_COLUMNS} FROM discussion_log WHERE symbol = ?1 \
             ORDER BY created_at DESC LIMIT ?2"
        ))?;

        let rows = stmt
            .query_map(rusqlite::params![symbol, limit as i64], map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn count(&self) -> Result<usize, LogError> {
        let conn = self.lock()?;
        let count: usize =
            conn.query_row("SELECT COUNT(*) FROM discussion_log", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl SessionLog for SqliteDiscussionLog {
    fn append(&self, row: &DiscussionRow) -> Result<(), LogError> {
        self.insert(row)
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<DiscussionRow> {
    let duration: i64 = row.get(9)?;
    Ok(DiscussionRow {
        session_id: row.get(0)?,
        symbol: row.get(1)?,
        depth: row.get(2)?,
        round1_json: row.get(3)?,
        round2_json: row.get(4)?,
        decision_json: row.get(5)?,
        decision_source: row.get(6)?,
        consensus_level: row.get(7)?,
        action: row.get(8)?,
        total_duration_ms: duration.max(0) as u64,
        timings_json: row.get(10)?,
        created_at: row.get(11)?,
    })
}
