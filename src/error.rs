//! Error types for Synheart Calm

use thiserror::Error;

/// Errors surfaced by the calm engine.
///
/// Persistence problems (malformed stored JSON, failed writes) are recovered
/// inside the stores and never reach callers through this type. It is only
/// returned for caller input that cannot be honoured.
#[derive(Debug, Error)]
pub enum CalmError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid rating {0}: expected a value from 1 to 5")]
    InvalidRating(u8),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Generator error: {0}")]
    Generator(String),

    #[error("Unknown session: {0}")]
    UnknownSession(String),
}

impl From<std::io::Error> for CalmError {
    fn from(e: std::io::Error) -> Self {
        CalmError::Storage(e.to_string())
    }
}
