// src/process/mod.rs
pub mod mapper;
pub mod normalize;
pub mod raw_table;
pub mod utils;

use crate::error::{IngestError, IngestResult};
use csv::ReaderBuilder;
use std::{fmt, fs::File, io::BufReader, path::Path};
use tracing::debug;

pub use mapper::apply_mapping;
pub use normalize::normalize;
pub use raw_table::RawTable;

/// A single cell after mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Number(f64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form sent to the database; `None` is SQL NULL.
    pub fn to_sql_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Rows labeled with canonical column names, ready for a loader.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RecordSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }
}

/// Read a headed CSV file fully into memory.
///
/// Rows may be ragged; width problems are left for the mapper to resolve.
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_csv<P: AsRef<Path>>(path: P) -> IngestResult<RawTable> {
    let path = path.as_ref();
    let file_err = |reason: String| IngestError::FileLoad {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| file_err(e.to_string()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| file_err(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        return Err(file_err("no header row".into()));
    }

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record =
            result.map_err(|e| file_err(format!("CSV parse error at record {}: {}", idx, e)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    debug!(columns = headers.len(), rows = rows.len(), "read csv");

    Ok(RawTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(content.as_bytes()).unwrap();
        tmp
    }

    #[test]
    fn reads_headers_and_ragged_rows() {
        let tmp = csv_file("Country/Region,Confirmed\n\"Korea, South\",14269\nChad\n");
        let raw = read_csv(tmp.path()).unwrap();
        assert_eq!(raw.headers, vec!["Country/Region", "Confirmed"]);
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[0], vec!["Korea, South", "14269"]);
        assert_eq!(raw.rows[1], vec!["Chad"]);
    }

    #[test]
    fn missing_file_is_a_file_load_error() {
        let err = read_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, IngestError::FileLoad { .. }));
    }

    #[test]
    fn empty_file_is_a_file_load_error() {
        let tmp = csv_file("");
        assert!(matches!(
            read_csv(tmp.path()),
            Err(IngestError::FileLoad { .. })
        ));
    }

    #[test]
    fn numbers_render_in_shortest_form() {
        assert_eq!(Value::Number(100.0).to_sql_text().as_deref(), Some("100"));
        assert_eq!(Value::Number(1.5).to_sql_text().as_deref(), Some("1.5"));
        assert_eq!(Value::Null.to_sql_text(), None);
    }
}
