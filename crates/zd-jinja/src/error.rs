//! Error types for zd-jinja

use thiserror::Error;

/// Template resolution and rendering errors
#[derive(Error, Debug)]
pub enum JinjaError {
    /// Template render error (J001)
    #[error("[J001] Failed to render template '{template}': {message}")]
    RenderError { template: String, message: String },

    /// Undefined variable (J002)
    #[error("[J002] Undefined variable '{name}' in template '{template}'")]
    UndefinedVariable { name: String, template: String },

    /// Template file not found (J003)
    #[error("[J003] Template '{name}' not found in {dir}")]
    TemplateNotFound { name: String, dir: String },

    /// SQL directory missing (J004)
    #[error("[J004] SQL template directory not found: {path}")]
    SqlDirNotFound { path: String },

    /// IO error while reading a template (J005)
    #[error("[J005] IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for JinjaError
pub type JinjaResult<T> = Result<T, JinjaError>;
