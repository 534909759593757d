use thiserror::Error;

use crate::family::PersonHandle;

/// Main error type for Kinship
#[derive(Error, Debug)]
pub enum KinshipError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The relationship source or person directory could not be reached
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// No person with this handle exists in the store
    #[error("Person not found: {0}")]
    PersonNotFound(PersonHandle),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using KinshipError
pub type Result<T> = std::result::Result<T, KinshipError>;
