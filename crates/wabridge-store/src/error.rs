//! Error types for persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while persisting or loading state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading a file failed.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing a file failed.
    #[error("failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Removing a file failed.
    #[error("failed to remove {path}: {source}")]
    RemoveError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Creating a directory failed.
    #[error("failed to create directory {path}: {source}")]
    DirectoryError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
