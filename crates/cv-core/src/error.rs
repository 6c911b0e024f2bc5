//! Error types for cv-core

use thiserror::Error;

/// Core error type for Convoy
#[derive(Error, Debug)]
pub enum CoreError {
    /// CV001: Configuration file not found
    #[error("[CV001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// CV002: Failed to parse configuration file
    #[error("[CV002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// CV003: Invalid configuration value
    #[error("[CV003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// CV004: Extension identifier does not match its subset's pattern
    #[error("[CV004] {kind} extension format is invalid ({extension:?}). It should be in the format `{expected}` with only lowercase letters, digits and single underscores")]
    InvalidExtensionFormat {
        kind: ExtensionKind,
        extension: String,
        expected: &'static str,
    },

    /// CV005: External extension registered twice
    #[error("[CV005] Extension {extension:?} already registered")]
    DuplicateExtension { extension: String },

    /// CV006: Two extension registries are not the same version
    #[error("[CV006] Incompatible extension registries: {reason}")]
    IncompatibleRegistries { reason: String },

    /// CV007: IO error with file path context
    #[error("[CV007] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },
}

/// Which subset of an extension set an identifier was validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Internal,
    External,
    /// Identifier matched neither subset while being classified.
    Unknown,
}

impl std::fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtensionKind::Internal => f.write_str("Internal"),
            ExtensionKind::External => f.write_str("External"),
            ExtensionKind::Unknown => f.write_str("Unclassified"),
        }
    }
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::ConfigParseError {
            message: err.to_string(),
        }
    }
}
