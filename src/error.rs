//! Error types for the media state engine

use thiserror::Error;

/// Result type alias for state owner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving media state owners
#[derive(Error, Debug)]
pub enum Error {
    /// The state owner lacks the requested capability
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The platform refused the operation (user gesture, permissions)
    #[error("Not allowed: {0}")]
    NotAllowed(String),

    /// The state owner is not ready for the operation yet
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Preference storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed attribute or scenario input
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for rejections that mean "try again once the media has loaded".
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }
}
