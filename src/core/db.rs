//! SQLite connection primitives for the approval ledger.
//!
//! Enables WAL mode, foreign keys, and a 5-second busy timeout. The ledger
//! is the only SQLite consumer; journals are plain JSONL files.

use crate::core::error::CorridorError;
use rusqlite::Connection;
use std::path::Path;

/// Establish a SQLite connection with Corridor's standard configuration.
pub fn db_connect(db_path: &Path) -> Result<Connection, CorridorError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(CorridorError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(CorridorError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(CorridorError::RusqliteError)?;
    Ok(conn)
}
