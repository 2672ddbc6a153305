//! Error types for session management.

use thiserror::Error;

use wabridge_models::SessionId;

/// Errors that can occur while managing sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A session with this id is already registered.
    #[error("session already exists: {0}")]
    AlreadyExists(SessionId),

    /// No session with this id is registered.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] wabridge_store::StoreError),

    /// Protocol transport failure.
    #[error(transparent)]
    Protocol(#[from] wabridge_protocol::ProtocolError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
