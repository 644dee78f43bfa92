//! Error types for zd-core

use thiserror::Error;

/// Core error type for Zangetsu Data
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Failed to parse configuration file
    #[error("[C002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// C003: Invalid configuration value
    #[error("[C003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C004: A connection is missing a field it needs
    #[error("[C004] Connection '{connection}' is missing required field '{field}'")]
    MissingField { connection: String, field: String },

    /// C005: IO error with file path context
    #[error("[C005] IO error at {path}: {source}")]
    IoWithPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// C006: Row width does not match the frame's column count
    #[error("[C006] Row has {actual} values but the frame has {expected} columns")]
    FrameShape { expected: usize, actual: usize },

    /// C007: Identifier rejected by validation
    #[error("[C007] Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },
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
