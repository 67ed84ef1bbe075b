// Database layer - SQLite connection, migrations, history queries

use chrono::{DateTime, Local};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Result};
use std::path::Path;

use crate::history::LogEntry;

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Database { conn })
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Database { conn })
    }

    /// Run migrations to set up the database schema
    pub fn run_migrations(&self) -> Result<()> {
        let migration_001 = include_str!("migrations/001_init.sql");
        self.conn.execute_batch(migration_001)?;
        Ok(())
    }

    // --- Log entry operations ---

    /// Insert one entry. Returns the new row ID.
    pub fn insert_log_entry(&self, entry: &LogEntry) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO log_entries (created_at, created_at_ms, input, output) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.timestamp.to_rfc3339(),
                entry.timestamp.timestamp_millis(),
                entry.input,
                entry.output,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Entries newest first. Rows with the same millisecond keep insertion order, newest first.
    pub fn get_log_entries(&self, limit: Option<usize>) -> Result<Vec<LogEntry>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            "SELECT created_at, input, output FROM log_entries
             ORDER BY created_at_ms DESC, id DESC
             LIMIT ?",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let created_at: String = row.get(0)?;
            let timestamp = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?
                .with_timezone(&Local);
            Ok(LogEntry {
                timestamp,
                input: row.get(1)?,
                output: row.get(2)?,
            })
        })?;

        rows.collect()
    }

    /// Replace the stored history with `entries` (given newest first).
    pub fn replace_log_entries(&self, entries: &[LogEntry]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM log_entries", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO log_entries (created_at, created_at_ms, input, output) VALUES (?1, ?2, ?3, ?4)",
            )?;
            // Oldest first so that ids grow with recency
            for entry in entries.iter().rev() {
                stmt.execute(params![
                    entry.timestamp.to_rfc3339(),
                    entry.timestamp.timestamp_millis(),
                    entry.input,
                    entry.output,
                ])?;
            }
        }
        tx.commit()
    }

    /// Delete everything but the newest `keep` entries. Returns the number removed.
    pub fn prune_log_entries(&self, keep: usize) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM log_entries WHERE id NOT IN (
                SELECT id FROM log_entries ORDER BY created_at_ms DESC, id DESC LIMIT ?
             )",
            [keep as i64],
        )?;
        Ok(removed)
    }
}
