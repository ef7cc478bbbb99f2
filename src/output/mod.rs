//! Data output writers

pub mod csv;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Generic output writer trait
pub trait OutputWriter {
    /// Flush any buffered data to disk
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the writer and finalize output
    fn close(self) -> OutputResult<()>;
}

/// Trait for writing pre-rendered rows
pub trait RowsWriter: OutputWriter {
    /// Write the header row
    fn write_header(&mut self, columns: &[&str]) -> OutputResult<()>;

    /// Write one data row of already rendered cells
    fn write_row(&mut self, cells: &[String]) -> OutputResult<()>;

    /// Write multiple rows at once
    fn write_rows(&mut self, rows: &[Vec<String>]) -> OutputResult<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }
}

/// In-memory writer that records everything it receives.
#[derive(Debug, Default, Clone)]
pub struct MemoryRowsWriter {
    /// Header, if one was written
    pub header: Option<Vec<String>>,
    /// Data rows in write order
    pub rows: Vec<Vec<String>>,
    /// Number of flush calls
    pub flushes: usize,
}

impl MemoryRowsWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputWriter for MemoryRowsWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.flushes += 1;
        Ok(())
    }

    fn close(self) -> OutputResult<()> {
        Ok(())
    }
}

impl RowsWriter for MemoryRowsWriter {
    fn write_header(&mut self, columns: &[&str]) -> OutputResult<()> {
        self.header = Some(columns.iter().map(|c| c.to_string()).collect());
        Ok(())
    }

    fn write_row(&mut self, cells: &[String]) -> OutputResult<()> {
        self.rows.push(cells.to_vec());
        Ok(())
    }
}
