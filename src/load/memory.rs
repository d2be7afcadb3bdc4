use crate::load::{BatchOutcome, TableRef, Target};
use async_trait::async_trait;
use csv::ReaderBuilder;
use std::collections::{BTreeMap, HashSet};

type Row = Vec<Option<String>>;

/// A table held in memory. Columns are untyped; only NOT NULL is enforced.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<String>,
    pub not_null: HashSet<String>,
    pub rows: Vec<Row>,
}

impl MemoryTable {
    /// Reorder an incoming row into table column order, checking constraints.
    fn accept(&self, columns: &[String], row: &[Option<String>]) -> Result<Row, String> {
        if row.len() != columns.len() {
            return Err(format!(
                "expected {} values, got {}",
                columns.len(),
                row.len()
            ));
        }
        let mut out: Row = vec![None; self.columns.len()];
        for (col, val) in columns.iter().zip(row) {
            let idx = self
                .columns
                .iter()
                .position(|c| c == col)
                .ok_or_else(|| format!("column \"{}\" does not exist", col))?;
            out[idx] = val.clone();
        }
        for (col, val) in self.columns.iter().zip(&out) {
            if val.is_none() && self.not_null.contains(col) {
                return Err(format!(
                    "null value in column \"{}\" violates not-null constraint",
                    col
                ));
            }
        }
        Ok(out)
    }
}

/// In-process stand-in for the database.
///
/// Writes are all-or-nothing per call, like a committed or rolled back
/// transaction. Tables must be declared up front unless the target was built
/// with [`MemoryTarget::permissive`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    tables: BTreeMap<String, MemoryTable>,
    create_missing: bool,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept writes to any table, creating it from the first column list seen.
    pub fn permissive() -> Self {
        Self {
            tables: BTreeMap::new(),
            create_missing: true,
        }
    }

    pub fn with_table(mut self, name: &str, columns: &[&str], not_null: &[&str]) -> Self {
        self.tables.insert(
            name.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                not_null: not_null.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        self
    }

    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(name)
    }

    pub fn rows(&self, name: &str) -> &[Row] {
        self.tables.get(name).map(|t| t.rows.as_slice()).unwrap_or(&[])
    }

    fn table_for_write(&mut self, table: TableRef<'_>) -> Result<&mut MemoryTable, String> {
        if self.create_missing && !self.tables.contains_key(table.name) {
            self.tables.insert(
                table.name.to_string(),
                MemoryTable {
                    columns: table.columns.to_vec(),
                    ..Default::default()
                },
            );
        }
        self.tables
            .get_mut(table.name)
            .ok_or_else(|| format!("relation \"{}\" does not exist", table.name))
    }

    /// Validate every row, then append all of them or none.
    fn apply(&mut self, table: TableRef<'_>, rows: Vec<Row>) -> BatchOutcome {
        let tbl = match self.table_for_write(table) {
            Ok(t) => t,
            Err(reason) => return BatchOutcome::failed(0, None, reason),
        };

        let mut staged = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            match tbl.accept(table.columns, row) {
                Ok(r) => staged.push(r),
                Err(reason) => return BatchOutcome::failed(staged.len() as u64, Some(i), reason),
            }
        }
        let n = staged.len() as u64;
        tbl.rows.extend(staged);
        BatchOutcome::committed(n)
    }
}

#[async_trait]
impl Target for MemoryTarget {
    async fn copy_in(&mut self, table: TableRef<'_>, payload: Vec<u8>) -> BatchOutcome {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(payload.as_slice());

        let mut rows = Vec::new();
        for result in rdr.records() {
            match result {
                Ok(rec) => rows.push(
                    rec.iter()
                        .map(|f| (!f.is_empty()).then(|| f.to_string()))
                        .collect(),
                ),
                Err(e) => return BatchOutcome::failed(0, None, e.to_string()),
            }
        }
        // COPY reports no row position; the whole stream fails as one
        match self.apply(table, rows) {
            BatchOutcome {
                failure: Some(f), ..
            } => BatchOutcome::failed(0, None, f.reason),
            ok => ok,
        }
    }

    async fn insert_rows(&mut self, table: TableRef<'_>, rows: &[Row]) -> BatchOutcome {
        self.apply(table, rows.to_vec())
    }
}
