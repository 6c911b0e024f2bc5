//! Error types for cv-gate

use cv_core::CoreError;
use cv_db::{DbError, Retryable};
use cv_schema::SchemaError;
use thiserror::Error;

/// Version gate errors.
///
/// Every variant is terminal for the current `open` attempt. Waiting for
/// peers is reported through `OpenOutcome`, not through this type.
#[derive(Error, Debug)]
pub enum GateError {
    /// The engine did not report readiness in time (G001)
    #[error("[G001] Database engine was not ready within {timeout_ms}ms")]
    EngineNotReady { timeout_ms: u64 },

    /// Opening the database handle failed (G002)
    #[error("[G002] Failed to open database: {0}")]
    Open(#[source] DbError),

    /// A peer runs a newer schema with the same extensions (G003)
    #[error("[G003] Cluster expects schema version ({expected}) but this system has ({actual}), please upgrade")]
    ClusterVersionMismatch { expected: u32, actual: u32 },

    /// A peer has at least as many API extensions, but not the same ones (G004)
    #[error("[G004] Cluster expects API version ({expected}) but this system has ({actual}), please upgrade")]
    ClusterExtensionMismatch { expected: usize, actual: usize },

    /// This member's own versioning row could not be written (G005)
    #[error("[G005] Failed to update schema version when joining/upgrading cluster as {address}: {source}")]
    MemberUpdate {
        address: String,
        #[source]
        source: SchemaError,
    },

    /// Schema migration error (G006)
    #[error("[G006] {0}")]
    Schema(#[from] SchemaError),

    /// Database error (G007)
    #[error("[G007] {0}")]
    Db(#[from] DbError),

    /// Configuration or extension error (G008)
    #[error("[G008] {0}")]
    Core(#[from] CoreError),

    /// The operation needs an open database (G009)
    #[error("[G009] Database is not yet open")]
    NotOpen,

    /// The auto-update executable failed (G010)
    #[error("[G010] Triggering cluster update with {executable} failed: {message}")]
    UpdateFailed { executable: String, message: String },

    /// Shutdown was requested while waiting (G011)
    #[error("[G011] Cancelled by shutdown")]
    Cancelled,
}

/// Result type alias for GateError
pub type GateResult<T> = Result<T, GateError>;

impl Retryable for GateError {
    fn is_busy(&self) -> bool {
        match self {
            GateError::Db(err) => err.is_busy(),
            GateError::Schema(err) | GateError::MemberUpdate { source: err, .. } => err.is_busy(),
            _ => false,
        }
    }

    fn is_deadline_exceeded(&self) -> bool {
        match self {
            GateError::Db(err) => err.is_deadline_exceeded(),
            GateError::Schema(err) | GateError::MemberUpdate { source: err, .. } => {
                err.is_deadline_exceeded()
            }
            _ => false,
        }
    }
}
