//! File-backed record writers: JSON array, JSON lines and CSV

use super::traits::{RecordWriter, SinkResult};
use crate::extract::Record;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Opens an output file, truncating or appending
///
/// Missing parent directories are created. Returns the file and whether it
/// already held data (only possible when appending).
pub(crate) fn open_output(path: &Path, overwrite: bool) -> SinkResult<(File, bool)> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if overwrite {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    let file = options.open(path)?;
    let had_data = !overwrite && file.metadata()?.len() > 0;
    Ok((file, had_data))
}

/// Writes records as one JSON array
///
/// Appending to a file that already holds an array produces two arrays back
/// to back, which most JSON readers reject; use `jsonl` for appendable
/// output.
pub struct JsonArrayWriter {
    out: BufWriter<File>,
    fields: Vec<String>,
    count: u64,
}

impl JsonArrayWriter {
    pub fn create(path: &Path, overwrite: bool, fields: Vec<String>) -> SinkResult<Self> {
        let (file, had_data) = open_output(path, overwrite)?;
        if had_data {
            tracing::warn!(
                "Appending a JSON array to non-empty {}; the file will hold several arrays",
                path.display()
            );
        }
        let mut out = BufWriter::new(file);
        out.write_all(b"[")?;
        Ok(Self {
            out,
            fields,
            count: 0,
        })
    }
}

impl RecordWriter for JsonArrayWriter {
    fn write(&mut self, record: &Record) -> SinkResult<()> {
        if self.count > 0 {
            self.out.write_all(b",")?;
        }
        self.out.write_all(b"\n")?;
        serde_json::to_writer(&mut self.out, &record.project(&self.fields))?;
        self.count += 1;
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.out.write_all(b"\n]\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Writes one JSON object per line
pub struct JsonLinesWriter {
    out: BufWriter<File>,
    fields: Vec<String>,
}

impl JsonLinesWriter {
    pub fn create(path: &Path, overwrite: bool, fields: Vec<String>) -> SinkResult<Self> {
        let (file, _) = open_output(path, overwrite)?;
        Ok(Self {
            out: BufWriter::new(file),
            fields,
        })
    }
}

impl RecordWriter for JsonLinesWriter {
    fn write(&mut self, record: &Record) -> SinkResult<()> {
        serde_json::to_writer(&mut self.out, &record.project(&self.fields))?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Writes records as CSV rows
///
/// The header is the configured field list, or the first record's fields
/// when none is configured. Absent values become empty cells; lists are
/// comma-joined.
pub struct CsvWriter {
    out: csv::Writer<File>,
    columns: Vec<String>,
    header_pending: bool,
}

impl CsvWriter {
    pub fn create(path: &Path, overwrite: bool, fields: Vec<String>) -> SinkResult<Self> {
        let (file, had_data) = open_output(path, overwrite)?;
        Ok(Self {
            out: csv::Writer::from_writer(file),
            columns: fields,
            header_pending: !had_data,
        })
    }
}

impl RecordWriter for CsvWriter {
    fn write(&mut self, record: &Record) -> SinkResult<()> {
        if self.columns.is_empty() {
            self.columns = record.field_names().map(str::to_string).collect();
        }
        if self.header_pending {
            self.out.write_record(&self.columns)?;
            self.header_pending = false;
        }

        let view = record.project(&self.columns);
        let row = view
            .entries()
            .iter()
            .map(|(_, value)| value.map(|v| v.to_string()).unwrap_or_default());
        self.out.write_record(row)?;
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.out.flush()?;
        Ok(())
    }
}
