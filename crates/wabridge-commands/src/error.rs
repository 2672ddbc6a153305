//! Error types for command execution.

use thiserror::Error;

use crate::parser::ParseError;

/// Errors that can occur while executing a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command arguments did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// HTTP transport failure talking to the external API.
    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The external API answered with a non-success status.
    #[error("API returned status {0}")]
    ApiStatus(u16),

    /// The external API answered 2xx but rejected the request.
    #[error("API rejected the request: {0}")]
    ApiRejected(String),

    /// Referenced media could not be downloaded.
    #[error(transparent)]
    Protocol(#[from] wabridge_protocol::ProtocolError),
}

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, CommandError>;
