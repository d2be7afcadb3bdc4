// src/source/mod.rs
use crate::error::{IngestError, IngestResult};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt, fs,
    path::{Path, PathBuf},
};

/// How a normalized record set reaches its table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One `COPY ... FROM STDIN` stream for the whole table.
    Bulk,
    /// One parameterized INSERT per row, all inside one transaction.
    #[default]
    Row,
}

impl Strategy {
    pub fn as_str(&self) -> &str {
        match self {
            Strategy::Bulk => "bulk",
            Strategy::Row => "row",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical table column, optionally tied to the CSV header it comes from.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq, Hash)]
#[serde(from = "ColumnEntry")]
pub struct Column {
    pub name: String,
    pub source: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnEntry {
    Bare(String),
    Mapped { name: String, source: String },
}

impl From<ColumnEntry> for Column {
    fn from(entry: ColumnEntry) -> Self {
        match entry {
            ColumnEntry::Bare(name) => Column { name, source: None },
            ColumnEntry::Mapped { name, source } => Column {
                name,
                source: Some(source),
            },
        }
    }
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            source: None,
        }
    }

    pub fn from_header(name: impl Into<String>, source: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            source: Some(source.into()),
        }
    }
}

/// How raw CSV columns are matched to canonical names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapping<'a> {
    /// Physical column `j` is labeled with the `j`-th name. Unchecked.
    Positional(Vec<&'a str>),
    /// `(canonical, header)` pairs; each canonical column is looked up by header.
    ByHeader(Vec<(&'a str, &'a str)>),
}

/// One CSV-to-table load job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub file_path: PathBuf,
    pub table: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub numeric_columns: Vec<String>,
    #[serde(default)]
    pub strategy: Strategy,
}

impl SourceDescriptor {
    pub fn new(
        file_path: impl Into<PathBuf>,
        table: impl Into<String>,
        columns: Vec<Column>,
        numeric_columns: Vec<String>,
        strategy: Strategy,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            table: table.into(),
            columns,
            numeric_columns,
            strategy,
        }
    }

    /// Canonical column names in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn mapping(&self) -> Mapping<'_> {
        if !self.columns.is_empty() && self.columns.iter().all(|c| c.source.is_some()) {
            Mapping::ByHeader(
                self.columns
                    .iter()
                    .filter_map(|c| c.source.as_deref().map(|s| (c.name.as_str(), s)))
                    .collect(),
            )
        } else {
            Mapping::Positional(self.columns.iter().map(|c| c.name.as_str()).collect())
        }
    }

    pub fn validate(&self) -> IngestResult<()> {
        let fail = |msg: String| Err(IngestError::Config(format!("{}: {}", self.table, msg)));

        if self.table.trim().is_empty() {
            return Err(IngestError::Config(format!(
                "{}: empty table name",
                self.file_path.display()
            )));
        }
        if self.columns.is_empty() {
            return fail("no columns configured".into());
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if col.name.trim().is_empty() {
                return fail("empty column name".into());
            }
            if !seen.insert(col.name.as_str()) {
                return fail(format!("duplicate column `{}`", col.name));
            }
        }

        let named = self.columns.iter().filter(|c| c.source.is_some()).count();
        if named != 0 && named != self.columns.len() {
            return fail(format!(
                "{} of {} columns name a source header; use all or none",
                named,
                self.columns.len()
            ));
        }

        for num in &self.numeric_columns {
            if !seen.contains(num.as_str()) {
                return fail(format!("numeric column `{}` is not a table column", num));
            }
        }
        Ok(())
    }
}

/// The ordered list of sources one run processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceManifest {
    pub sources: Vec<SourceDescriptor>,
}

impl SourceManifest {
    pub fn from_yaml(text: &str) -> IngestResult<Self> {
        let manifest: SourceManifest =
            serde_yaml::from_str(text).map_err(|e| IngestError::Config(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: impl AsRef<Path>) -> IngestResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| IngestError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.sources.is_empty() {
            return Err(IngestError::Config("manifest lists no sources".into()));
        }
        self.sources.iter().try_for_each(SourceDescriptor::validate)
    }

    /// Rebase relative file paths onto `base`.
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        for src in &mut self.sources {
            if src.file_path.is_relative() {
                src.file_path = base.join(&src.file_path);
            }
        }
        self
    }
}
