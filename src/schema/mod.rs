//! Column schemas for flattening vulnerability records into CSV rows.
//!
//! A [`Schema`] is an ordered list of columns. Each column either projects a
//! value out of a record through a field path, or emits the running row index.
//!
//! # File format
//!
//! One column per line, `columnName:token1,token2,...`:
//!
//! ```text
//! index:null
//! cveId:cve,id
//! baseScore:cve,metrics,cvssMetricV31,0,cvssData,baseScore
//! ```
//!
//! All-digit tokens index into arrays, `null` marks the row-index column and
//! every other token is an object key. Blank lines and lines starting with `#`
//! are ignored.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub mod projection;

pub use projection::project;

/// Token that marks a row-index column in a schema file.
const ROW_INDEX_TOKEN: &str = "null";

/// Schema loading errors
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Schema file could not be opened or read
    #[error("failed to read schema file {}: {source}", path.display())]
    Load {
        /// Path that was requested
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A line does not follow `columnName:token,...`
    #[error("malformed schema line {line}: {reason} ({content:?})")]
    Format {
        /// 1-based line number
        line: usize,
        /// Offending line as written
        content: String,
        /// What is wrong with it
        reason: String,
    },

    /// A column built in code cannot be written as a schema line
    #[error("invalid column {column:?}: {reason}")]
    InvalidColumn {
        /// Column name as given
        column: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// Object member lookup
    Key(String),
    /// Array element lookup
    Index(usize),
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Key(name) => f.write_str(name),
            FieldKey::Index(index) => write!(f, "{index}"),
        }
    }
}

/// How a column obtains its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSpec {
    /// Project the value at this path out of each record
    FieldPath(Vec<FieldKey>),
    /// Emit the run-wide row counter
    RowIndex,
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Header name, unique within a schema
    pub name: String,
    /// Value source
    pub spec: ColumnSpec,
}

/// Ordered, immutable column mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Built-in schema for NVD CVE API 2.0 entries (CVSS v3.1 primary metric).
    pub fn default_nvd() -> Self {
        let cvss = ["cve", "metrics", "cvssMetricV31", "0"];
        let cvss_data = ["cve", "metrics", "cvssMetricV31", "0", "cvssData"];

        let path = |prefix: &[&str], leaf: &str| {
            ColumnSpec::FieldPath(prefix.iter().copied().chain([leaf]).map(coerce_key).collect())
        };

        let columns = vec![
            Column::row_index("index"),
            Column::new("cveId", path(&["cve"], "id")),
            Column::new("sourceIdentifier", path(&["cve"], "sourceIdentifier")),
            Column::new("published", path(&["cve"], "published")),
            Column::new("lastModified", path(&["cve"], "lastModified")),
            Column::new("vulnStatus", path(&["cve"], "vulnStatus")),
            Column::new("cvssVersion", path(&cvss_data, "version")),
            Column::new("baseScore", path(&cvss_data, "baseScore")),
            Column::new("baseSeverity", path(&cvss_data, "baseSeverity")),
            Column::new("vectorString", path(&cvss_data, "vectorString")),
            Column::new("exploitabilityScore", path(&cvss, "exploitabilityScore")),
            Column::new("impactScore", path(&cvss, "impactScore")),
        ];

        Self { columns }
    }

    /// Build a schema from columns.
    ///
    /// Rejects anything [`Schema::to_description`] could not write back
    /// unchanged: duplicate or malformed names, keys that would reload as an
    /// index or as the row-index marker, and empty paths.
    pub fn from_columns(columns: Vec<Column>) -> SchemaResult<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            let invalid = |reason: &str| SchemaError::InvalidColumn {
                column: column.name.clone(),
                reason: reason.to_string(),
            };

            if let Some(reason) = name_problem(&column.name) {
                return Err(invalid(reason));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(invalid("duplicate column name"));
            }
            if let ColumnSpec::FieldPath(path) = &column.spec {
                if path.is_empty() {
                    return Err(invalid("empty field path"));
                }
                for key in path {
                    if let FieldKey::Key(key) = key {
                        if let Some(reason) = key_problem(key) {
                            return Err(invalid(reason));
                        }
                    }
                }
            }
        }
        Ok(Self { columns })
    }

    /// Load a schema description from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> SchemaResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        let schema = Self::parse(&text)?;
        info!(
            path = %path.display(),
            columns = schema.len(),
            "Loaded column schema"
        );
        Ok(schema)
    }

    /// Parse a schema description.
    pub fn parse(text: &str) -> SchemaResult<Self> {
        let mut columns: Vec<Column> = Vec::new();
        let mut seen = HashSet::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let format_error = |reason: &str| SchemaError::Format {
                line: line_no,
                content: raw.to_string(),
                reason: reason.to_string(),
            };

            let (name, rest) = line
                .split_once(':')
                .ok_or_else(|| format_error("missing ':' separator"))?;
            let name = name.trim();
            if let Some(reason) = name_problem(name) {
                return Err(format_error(reason));
            }
            if !seen.insert(name.to_string()) {
                return Err(format_error("duplicate column name"));
            }

            let spec = parse_tokens(rest).map_err(|reason| format_error(&reason))?;
            debug!(line = line_no, column = name, spec = ?spec, "Parsed schema column");
            columns.push(Column::new(name, spec));
        }

        Ok(Self { columns })
    }

    /// Render the schema back into the file format accepted by [`Schema::parse`].
    pub fn to_description(&self) -> String {
        let mut out = String::new();
        for column in &self.columns {
            out.push_str(&column.name);
            out.push(':');
            match &column.spec {
                ColumnSpec::RowIndex => out.push_str(ROW_INDEX_TOKEN),
                ColumnSpec::FieldPath(path) => {
                    let tokens: Vec<String> = path.iter().map(ToString::to_string).collect();
                    out.push_str(&tokens.join(","));
                }
            }
            out.push('\n');
        }
        out
    }

    /// Columns in output order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Header names in output order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether any column emits the row counter
    pub fn has_row_index(&self) -> bool {
        self.columns
            .iter()
            .any(|c| matches!(c.spec, ColumnSpec::RowIndex))
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::default_nvd()
    }
}

impl Column {
    /// Create a column with an explicit spec
    pub fn new(name: impl Into<String>, spec: ColumnSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    /// Create a row-index column
    pub fn row_index(name: impl Into<String>) -> Self {
        Self::new(name, ColumnSpec::RowIndex)
    }
}

fn parse_tokens(rest: &str) -> Result<ColumnSpec, String> {
    let tokens: Vec<&str> = rest.split(',').map(str::trim).collect();

    if tokens.iter().any(|t| t.is_empty()) {
        return Err("empty path token".to_string());
    }

    if tokens.iter().any(|t| *t == ROW_INDEX_TOKEN) {
        return if tokens.len() == 1 {
            Ok(ColumnSpec::RowIndex)
        } else {
            Err(format!("'{ROW_INDEX_TOKEN}' must be the only token"))
        };
    }

    let mut path = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token.bytes().all(|b| b.is_ascii_digit()) {
            let index = token
                .parse::<usize>()
                .map_err(|e| format!("index '{token}' out of range: {e}"))?;
            path.push(FieldKey::Index(index));
        } else {
            path.push(FieldKey::Key(token.to_string()));
        }
    }
    Ok(ColumnSpec::FieldPath(path))
}

fn name_problem(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        Some("empty column name")
    } else if name.trim() != name {
        Some("column name has surrounding whitespace")
    } else if name.contains([':', ',']) {
        Some("column name contains ':' or ','")
    } else if name.starts_with('#') {
        Some("column name starts with '#'")
    } else if name.contains(char::is_control) {
        Some("column name contains a control character")
    } else {
        None
    }
}

fn key_problem(key: &str) -> Option<&'static str> {
    if key.is_empty() {
        Some("empty path key")
    } else if key.trim() != key {
        Some("path key has surrounding whitespace")
    } else if key.contains(',') || key.contains(char::is_control) {
        Some("path key contains ',' or a control character")
    } else if key == ROW_INDEX_TOKEN {
        Some("path key 'null' reloads as the row-index marker")
    } else if key.bytes().all(|b| b.is_ascii_digit()) {
        Some("all-digit path key reloads as an array index")
    } else {
        None
    }
}

/// Coerce a single token the same way the file parser does.
fn coerce_key(token: &str) -> FieldKey {
    match token.parse::<usize>() {
        Ok(index) if token.bytes().all(|b| b.is_ascii_digit()) => FieldKey::Index(index),
        _ => FieldKey::Key(token.to_string()),
    }
}
