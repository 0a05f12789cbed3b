use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::assembler::FinancialRecord;
use super::error::{EdinetError, Result};

/// Destination for assembled records.
pub trait RecordSink {
    fn write(&mut self, record: &FinancialRecord) -> Result<()>;

    /// Flushes buffered output. Called once after the last record.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<FinancialRecord> {
    fn write(&mut self, record: &FinancialRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Writes records as CSV with a header row.
#[derive(Debug)]
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    written: usize,
}

impl CsvSink<File> {
    /// Creates (or truncates) the file, creating parent directories as needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let writer = csv::Writer::from_path(path)?;
        tracing::info!(path = %path.display(), "writing records");
        Ok(Self { writer, written: 0 })
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            written: 0,
        }
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| EdinetError::FileError(e.into_error()))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write(&mut self, record: &FinancialRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
