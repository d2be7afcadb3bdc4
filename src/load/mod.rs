// src/load/mod.rs
pub mod memory;
pub mod postgres;

use crate::{
    error::{IngestError, IngestResult},
    process::RecordSet,
    source::Strategy,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::WriterBuilder;
use std::collections::HashMap;
use tracing::{error, info};

pub use memory::MemoryTarget;
pub use postgres::PgTarget;

/// Target table plus the column list a load writes, in order.
#[derive(Debug, Clone, Copy)]
pub struct TableRef<'a> {
    pub name: &'a str,
    pub columns: &'a [String],
}

/// First failure inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Zero-based row that failed, when the target can tell.
    pub row: Option<usize>,
    pub reason: String,
}

/// Result of one load attempt against one table.
///
/// `applied` counts rows the target accepted before it stopped. When
/// `failure` is set the whole batch was rolled back and nothing persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: u64,
    pub failure: Option<BatchFailure>,
}

impl BatchOutcome {
    pub fn committed(rows: u64) -> Self {
        Self {
            applied: rows,
            failure: None,
        }
    }

    pub fn failed(applied: u64, row: Option<usize>, reason: impl Into<String>) -> Self {
        Self {
            applied,
            failure: Some(BatchFailure {
                row,
                reason: reason.into(),
            }),
        }
    }

    pub fn is_committed(&self) -> bool {
        self.failure.is_none()
    }

    /// Rows that persisted.
    pub fn persisted(&self) -> u64 {
        if self.is_committed() {
            self.applied
        } else {
            0
        }
    }

    pub fn into_result(self, table: &str) -> IngestResult<u64> {
        match self.failure {
            None => Ok(self.applied),
            Some(f) => Err(IngestError::Load {
                table: table.to_string(),
                reason: match f.row {
                    Some(r) => format!("row {}: {}", r, f.reason),
                    None => f.reason,
                },
            }),
        }
    }
}

/// A database-like sink the loader writes to.
///
/// Each call is one transaction: it either commits every row or rolls back
/// and reports why.
#[async_trait]
pub trait Target: Send {
    /// Stream a headerless CSV payload (empty field = NULL) into `table`.
    async fn copy_in(&mut self, table: TableRef<'_>, payload: Vec<u8>) -> BatchOutcome;

    /// Insert `rows` one statement per row. `None` is NULL.
    async fn insert_rows(&mut self, table: TableRef<'_>, rows: &[Vec<Option<String>>])
        -> BatchOutcome;
}

/// Serialize the record set as headerless CSV with empty fields for null.
pub fn serialize_copy_buffer(set: &RecordSet) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::with_capacity(set.len() * 64));
    for (idx, row) in set.rows.iter().enumerate() {
        wtr.write_record(row.iter().map(|v| v.to_sql_text().unwrap_or_default()))
            .with_context(|| format!("serializing row {} into copy buffer", idx))?;
    }
    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("flushing copy buffer: {}", e.error()))
}

/// Row values in wire form.
pub fn text_rows(set: &RecordSet) -> Vec<Vec<Option<String>>> {
    set.rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_sql_text()).collect())
        .collect()
}

/// Quote an identifier, keeping a `schema.table` split.
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `COPY` statement matching [`serialize_copy_buffer`]'s output.
pub fn copy_statement(table: TableRef<'_>) -> String {
    let cols = column_list(table.columns);
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, NULL '', FORCE_NULL ({}))",
        quote_ident(table.name),
        cols,
        cols
    )
}

/// Positional INSERT; each placeholder is cast to the declared column type
/// when `types` knows it.
pub fn insert_statement(table: TableRef<'_>, types: &HashMap<String, String>) -> String {
    let placeholders = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| match types.get(c) {
            Some(ty) => format!("${}::{}", i + 1, ty),
            None => format!("${}", i + 1),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table.name),
        column_list(table.columns),
        placeholders
    )
}

/// Move one normalized record set into `table` with the chosen strategy.
#[tracing::instrument(level = "info", skip(target, set), fields(rows = set.len()))]
pub async fn load<T: Target + ?Sized>(
    target: &mut T,
    set: &RecordSet,
    table: &str,
    strategy: Strategy,
) -> BatchOutcome {
    let table_ref = TableRef {
        name: table,
        columns: &set.columns,
    };

    let outcome = match strategy {
        Strategy::Bulk => match serialize_copy_buffer(set) {
            Ok(payload) => target.copy_in(table_ref, payload).await,
            Err(e) => BatchOutcome::failed(0, None, format!("{:#}", e)),
        },
        Strategy::Row => target.insert_rows(table_ref, &text_rows(set)).await,
    };

    match &outcome.failure {
        None => info!(rows = outcome.applied, "data inserted"),
        Some(f) => error!(
            applied = outcome.applied,
            row = ?f.row,
            reason = %f.reason,
            "load failed; rolled back"
        ),
    }
    outcome
}
