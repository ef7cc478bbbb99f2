//! CSV row encoding and file output.
//!
//! Rows are rendered cell by cell before they reach the file: numbers are
//! written bare, text is wrapped in double quotes with embedded quotes doubled,
//! and missing values become empty cells. The writer joins rendered cells with
//! `,` and stages whole lines in memory until the next flush, so the file only
//! ever grows by complete rows.

use crate::schema::projection::is_empty_value;
use crate::schema::{project, ColumnSpec, Schema};
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use super::{OutputError, OutputResult, OutputWriter, RowsWriter};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Key of the record collection inside a page payload
pub const COLLECTION_KEY: &str = "vulnerabilities";

/// Platform line separator
pub const LINE_TERMINATOR: &str = if cfg!(windows) { "\r\n" } else { "\n" };

const DELIMITER: u8 = b',';

/// Errors raised when a payload cannot be treated as a record collection
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The collection key is absent
    #[error("payload has no '{0}' collection")]
    MissingCollection(&'static str),

    /// The collection key holds something other than a list
    #[error("payload field '{key}' is a {found}, expected a list")]
    NotACollection {
        /// Collection key
        key: &'static str,
        /// JSON type actually found
        found: &'static str,
    },
}

/// Render one projected value as a CSV cell.
pub fn render_cell(value: Option<&Value>) -> String {
    let value = match value {
        Some(v) if !is_empty_value(v) => v,
        _ => return String::new(),
    };

    match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) if looks_numeric(s) => s.clone(),
        Value::String(s) => quote(s),
        Value::Bool(b) => quote(if *b { "true" } else { "false" }),
        other => quote(&other.to_string()),
    }
}

/// Whether a string is a plain decimal number (`-12`, `7.5`).
pub fn looks_numeric(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    all_digits(int_part) && frac_part.map_or(true, all_digits)
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    out.push_str(&s.replace('"', "\"\""));
    out.push('"');
    out
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Flattens records into rendered rows according to a [`Schema`].
#[derive(Debug, Clone, Copy)]
pub struct RowEncoder<'a> {
    schema: &'a Schema,
}

impl<'a> RowEncoder<'a> {
    /// Create an encoder for `schema`
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Render a single record.
    ///
    /// Row-index columns show the current counter value; the counter advances
    /// once per row when the schema has at least one such column.
    pub fn encode_record(&self, record: &Value, counter: &mut u64) -> Vec<String> {
        let row = self
            .schema
            .columns()
            .iter()
            .map(|column| match &column.spec {
                ColumnSpec::RowIndex => counter.to_string(),
                ColumnSpec::FieldPath(path) => render_cell(project(record, path)),
            })
            .collect();

        if self.schema.has_row_index() {
            *counter += 1;
        }
        row
    }

    /// Render every entry of a page payload's record collection.
    pub fn encode_page(
        &self,
        payload: &Value,
        counter: &mut u64,
    ) -> Result<Vec<Vec<String>>, EncodingError> {
        let entries = match payload.get(COLLECTION_KEY) {
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                return Err(EncodingError::NotACollection {
                    key: COLLECTION_KEY,
                    found: json_type_name(other),
                })
            }
            None => return Err(EncodingError::MissingCollection(COLLECTION_KEY)),
        };

        Ok(entries
            .iter()
            .map(|entry| self.encode_record(entry, counter))
            .collect())
    }
}

/// CSV writer for rendered rows.
///
/// Rows are staged in memory and reach the file in a single write on
/// [`OutputWriter::flush`]. A row left in the stage when the process dies is
/// lost whole, never half written.
pub struct CsvRowWriter {
    file: File,
    staged: Vec<u8>,
    rows_written: u64,
    rows_staged: u64,
}

impl CsvRowWriter {
    /// Create a new CSV row writer, truncating any existing file
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Create a new CSV row writer with a custom initial staging capacity
    pub fn new_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating CSV writer: path={}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {}", e)))?;
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {}", e)))?;

        Ok(Self {
            file,
            staged: Vec::with_capacity(buffer_size),
            rows_written: 0,
            rows_staged: 0,
        })
    }

    /// Number of data rows accepted so far, flushed or not
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Number of data rows waiting for the next flush
    pub fn rows_staged(&self) -> u64 {
        self.rows_staged
    }

    fn stage_line<S: AsRef<str>>(&mut self, cells: &[S]) {
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                self.staged.push(DELIMITER);
            }
            self.staged.extend_from_slice(cell.as_ref().as_bytes());
        }
        self.staged.extend_from_slice(LINE_TERMINATOR.as_bytes());
    }
}

impl RowsWriter for CsvRowWriter {
    fn write_header(&mut self, columns: &[&str]) -> OutputResult<()> {
        self.stage_line(columns);
        Ok(())
    }

    fn write_row(&mut self, cells: &[String]) -> OutputResult<()> {
        self.stage_line(cells);
        self.rows_written += 1;
        self.rows_staged += 1;
        Ok(())
    }
}

impl OutputWriter for CsvRowWriter {
    fn flush(&mut self) -> OutputResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }

        self.file
            .write_all(&self.staged)
            .and_then(|_| self.file.flush())
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {}", e)))?;

        debug!("Flushed {} rows ({} bytes)", self.rows_staged, self.staged.len());
        self.staged.clear();
        self.rows_staged = 0;
        Ok(())
    }

    fn close(mut self) -> OutputResult<()> {
        debug!("Closing CSV writer: {} total rows written", self.rows_written);

        self.flush()?;

        self.file
            .sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {}", e)))?;

        info!("CSV writer closed successfully: {} rows written", self.rows_written);
        Ok(())
    }
}
