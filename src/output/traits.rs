//! Record writer trait and sink errors

use crate::extract::Record;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors raised by the record sink
///
/// Every sink error is fatal to the run.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record sink already finalized")]
    Finalized,

    #[error("record sink lock poisoned")]
    Poisoned,
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// A destination format for records
///
/// Implementations are driven by [`RecordSink`](super::RecordSink), which
/// serializes access; they do not need their own locking.
pub trait RecordWriter: Send {
    /// Writes one record
    fn write(&mut self, record: &Record) -> SinkResult<()>;

    /// Flushes and closes the destination; called exactly once
    fn finish(&mut self) -> SinkResult<()>;
}

/// Collects records in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryWriter {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle to the collected records that outlives the writer
    pub fn records(&self) -> Arc<Mutex<Vec<Record>>> {
        Arc::clone(&self.records)
    }
}

impl RecordWriter for MemoryWriter {
    fn write(&mut self, record: &Record) -> SinkResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        Ok(())
    }
}
