//! Crate-level error types.

use crate::extract::ExtractError;
use crate::fetch::FetchError;
use crate::quality::ContentTooShort;

/// Configuration could not be loaded or is inconsistent.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// All errors surfaced by this crate.
#[derive(thiserror::Error, Debug)]
pub enum IntegrityError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    ContentTooShort(#[from] ContentTooShort),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IntegrityError {
    /// Partial work carried by the error, if any.
    pub fn salvaged(&self) -> Option<&str> {
        match self {
            Self::ContentTooShort(e) => Some(&e.content),
            _ => None,
        }
    }
}

/// Convenience result type.
pub type IntegrityResult<T> = Result<T, IntegrityError>;
