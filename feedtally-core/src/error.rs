//! Error types for feedtally-core

use thiserror::Error;

/// Main error type for the feedtally-core library
///
/// Extraction itself never fails: unreadable items are skipped and missing
/// counts default to zero. These variants cover the I/O edges around it.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (command protocol)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The feed surface could not produce a snapshot or advance its viewport
    #[error("feed error: {0}")]
    Feed(String),

    /// Export could not be written or read back
    #[error("export error: {0}")]
    Export(String),

    /// Logging could not be initialized
    #[error("logging error: {0}")]
    Logging(String),
}

/// Result type alias for feedtally-core
pub type Result<T> = std::result::Result<T, Error>;
