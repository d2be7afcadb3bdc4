use std::path::PathBuf;
use thiserror::Error;

/// Failure classes of an ingestion run.
///
/// `Config`, `Settings` and `Connection` stop the process before any source is
/// touched. `FileLoad` and `Load` are scoped to a single source and only end
/// that source's attempt.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid source manifest: {0}")]
    Config(String),

    #[error("database settings: {0}")]
    Settings(String),

    #[error("connecting to database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("loading {path}: {reason}")]
    FileLoad { path: PathBuf, reason: String },

    #[error("loading table {table}: {reason}")]
    Load { table: String, reason: String },
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
