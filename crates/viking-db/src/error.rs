//! Error types for viking-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for viking-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in viking-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    // ========================================================================
    // Object store errors
    // ========================================================================
    /// No object or directory exists at the path.
    #[error("Object not found: {path}")]
    NotFound { path: String },

    /// An object or directory already exists at the path.
    #[error("Object already exists: {path}")]
    AlreadyExists { path: String },

    /// The path names a file where a directory was expected.
    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    /// The path names a directory where a file was expected.
    #[error("Is a directory: {path}")]
    IsADirectory { path: String },

    /// Directory removal without `recursive` on a non-empty directory.
    #[error("Directory not empty: {path}")]
    DirectoryNotEmpty { path: String },

    /// The path is malformed (relative, contains `..`, etc.).
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    // ========================================================================
    // Vector index errors
    // ========================================================================
    /// Vector index I/O error.
    #[error("Vector index I/O error at {path}: {message}")]
    VectorIo { path: PathBuf, message: String },

    /// Vector dimension mismatch.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // ========================================================================
    // General errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// Create a vector I/O error.
    pub fn vector_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::VectorIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error means "nothing at that path".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
