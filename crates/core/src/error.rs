//! Error types for the subword library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the subword library.
#[derive(Error, Debug)]
pub enum SubwordError {
    /// Error loading a persisted model
    #[error("Load error: {0}")]
    Load(String),

    /// Error saving a model
    #[error("Save error: {0}")]
    Save(String),

    /// I/O error with file context
    #[error("I/O error for {}: {err}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Error reading a training corpus
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for subword operations.
pub type Result<T> = std::result::Result<T, SubwordError>;
