//! Record output
//!
//! This module handles:
//! - Writing records as JSON, JSON lines, CSV or SQLite
//! - Enforcing the global item cutoff
//! - Recording crawl statistics and the run summary

mod budget;
mod sqlite;
pub mod stats;
mod traits;
mod writers;

pub use budget::CrawlBudget;
pub use sqlite::SqliteWriter;
pub use stats::{print_summary, CrawlCounters, RunSummary};
pub use traits::{MemoryWriter, RecordWriter, SinkError, SinkResult};
pub use writers::{CsvWriter, JsonArrayWriter, JsonLinesWriter};

use crate::config::{OutputConfig, OutputFormat};
use crate::extract::Record;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// What happened to an accepted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// Written; the budget has room left
    Written,
    /// Written, and it was the last record the budget allows
    CutoffReached,
    /// Dropped because the budget was already exhausted
    Truncated,
}

/// Opens the writer for the configured format
pub fn open_writer(config: &OutputConfig) -> SinkResult<Box<dyn RecordWriter>> {
    let path = Path::new(&config.path);
    let fields = config.fields.clone();
    let writer: Box<dyn RecordWriter> = match config.format {
        OutputFormat::Json => Box::new(JsonArrayWriter::create(path, config.overwrite, fields)?),
        OutputFormat::Jsonl => Box::new(JsonLinesWriter::create(path, config.overwrite, fields)?),
        OutputFormat::Csv => Box::new(CsvWriter::create(path, config.overwrite, fields)?),
        OutputFormat::Sqlite => Box::new(SqliteWriter::open(path, config.overwrite, fields)?),
    };
    Ok(writer)
}

/// The single place records leave the crawler
///
/// Writes and budget updates happen under one lock, so the number of
/// written records never exceeds the cutoff however many workers race.
pub struct RecordSink {
    writer: Mutex<Option<Box<dyn RecordWriter>>>,
    budget: Arc<CrawlBudget>,
}

impl RecordSink {
    pub fn new(writer: Box<dyn RecordWriter>, budget: Arc<CrawlBudget>) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
            budget,
        }
    }

    /// Opens the configured destination with the given cutoff
    pub fn open(config: &OutputConfig, max_items: Option<u64>) -> SinkResult<Self> {
        tracing::info!("Writing {:?} records to {}", config.format, config.path);
        Ok(Self::new(
            open_writer(config)?,
            Arc::new(CrawlBudget::new(max_items)),
        ))
    }

    pub fn budget(&self) -> &Arc<CrawlBudget> {
        &self.budget
    }

    /// Offers a record to the sink
    pub fn accept(&self, record: &Record) -> SinkResult<Emission> {
        let mut guard = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        let writer = guard.as_mut().ok_or(SinkError::Finalized)?;

        if self.budget.is_exhausted() {
            self.budget.record_truncated();
            return Ok(Emission::Truncated);
        }

        writer.write(record)?;
        if self.budget.record_emitted() {
            tracing::info!(
                "Item cutoff of {} reached",
                self.budget.max_items().unwrap_or_default()
            );
            Ok(Emission::CutoffReached)
        } else {
            Ok(Emission::Written)
        }
    }

    /// Flushes and closes the destination
    ///
    /// Only the first call does anything.
    pub fn finalize(&self) -> SinkResult<()> {
        let mut guard = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        match guard.take() {
            Some(mut writer) => writer.finish(),
            None => Ok(()),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.writer.lock().map(|w| w.is_none()).unwrap_or(true)
    }
}
