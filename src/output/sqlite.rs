//! SQLite record writer
//!
//! Records go to a single `records` table. The selected fields are stored
//! as a JSON object in `data`, so records from different extractors can
//! share the table.

use super::traits::{RecordWriter, SinkResult};
use crate::extract::Record;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        extractor TEXT NOT NULL,
        source_url TEXT NOT NULL,
        data TEXT NOT NULL,
        scraped_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_records_extractor ON records(extractor);
";

pub struct SqliteWriter {
    conn: Connection,
    fields: Vec<String>,
}

impl SqliteWriter {
    /// Opens (or creates) the database at `path`
    ///
    /// With `overwrite`, earlier records are dropped.
    pub fn open(path: &Path, overwrite: bool, fields: Vec<String>) -> SinkResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn, overwrite, fields)
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory(fields: Vec<String>) -> SinkResult<Self> {
        Self::init(Connection::open_in_memory()?, true, fields)
    }

    fn init(conn: Connection, overwrite: bool, fields: Vec<String>) -> SinkResult<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        if overwrite {
            conn.execute_batch("DROP TABLE IF EXISTS records;")?;
        }
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, fields })
    }

    /// Number of stored records
    pub fn count(&self) -> SinkResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl RecordWriter for SqliteWriter {
    fn write(&mut self, record: &Record) -> SinkResult<()> {
        let data = serde_json::to_string(&record.project(&self.fields))?;
        self.conn.execute(
            "INSERT INTO records (extractor, source_url, data, scraped_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.extractor(),
                record.source_url(),
                data,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}
