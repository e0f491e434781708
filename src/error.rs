//! Error types for schema evolution analysis

use thiserror::Error;

/// Result type for evolution operations
pub type Result<T> = std::result::Result<T, EvolutionError>;

/// Schema evolution errors
#[derive(Error, Debug)]
pub enum EvolutionError {
    #[error("Unresolved reference {reference}: {reason}")]
    SchemaResolution { reference: String, reason: String },

    #[error("Invalid schema at {path}: {reason}")]
    InvalidSchema { path: String, reason: String },

    #[error("Invalid compatibility mode: {0} (expected BACKWARD, FORWARD, FULL or NONE)")]
    InvalidMode(String),

    #[error("Analysis record not found: {0}")]
    HistoryNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),
}

impl EvolutionError {
    pub(crate) fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaResolution {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the schema documents themselves
    /// rather than the environment.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            EvolutionError::SchemaResolution { .. } | EvolutionError::InvalidSchema { .. }
        )
    }
}
