//! Error types for the schema migration engine and membership store.

use cv_core::CoreError;
use cv_db::{DbError, Retryable};
use thiserror::Error;

/// Schema and membership errors.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A schema update (regular or override) failed (S001).
    #[error("[S001] Schema update v{version:03} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: DbError,
    },

    /// The database is further along than any update this process knows (S002).
    #[error("[S002] Database schema version {current} is more recent than the latest known version {latest}")]
    VersionAhead { current: u32, latest: u32 },

    /// The update sequence has a gap or does not start at 1 (S003).
    #[error("[S003] Schema updates must be numbered contiguously from 1: expected v{expected}, found v{found}")]
    NonContiguous { expected: u32, found: u32 },

    /// An override targets a version with no regular update (S004).
    #[error("[S004] Schema override v{version} has no matching regular update")]
    OrphanOverride { version: u32 },

    /// A single-row write touched the wrong number of rows (S005).
    #[error("[S005] Updated {affected} rows in {table} for {key} instead of 1")]
    RowCount {
        table: &'static str,
        key: String,
        affected: usize,
    },

    /// No member matches the requested key (S006).
    #[error("[S006] No row in {table} for {key}")]
    NotFound { table: &'static str, key: String },

    /// A stored extension list failed validation (S007).
    #[error("[S007] Invalid extensions stored for member {address}: {source}")]
    InvalidExtensions {
        address: String,
        #[source]
        source: CoreError,
    },

    /// A stored value could not be decoded (S008).
    #[error("[S008] Failed to decode {table}.{column}: {message}")]
    Decode {
        table: &'static str,
        column: &'static str,
        message: String,
    },

    /// Engine error with preserved source chain (S009).
    #[error("[S009] {0}")]
    Db(#[from] DbError),
}

/// Result type alias for [`SchemaError`].
pub type SchemaResult<T> = Result<T, SchemaError>;

impl From<duckdb::Error> for SchemaError {
    fn from(err: duckdb::Error) -> Self {
        SchemaError::Db(DbError::from(err))
    }
}

impl Retryable for SchemaError {
    fn is_busy(&self) -> bool {
        match self {
            SchemaError::Migration { source, .. } | SchemaError::Db(source) => source.is_busy(),
            _ => false,
        }
    }

    fn is_deadline_exceeded(&self) -> bool {
        match self {
            SchemaError::Migration { source, .. } | SchemaError::Db(source) => {
                source.is_deadline_exceeded()
            }
            _ => false,
        }
    }
}
