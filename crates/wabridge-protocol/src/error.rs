//! Error types for the protocol seam.

use thiserror::Error;

/// Errors surfaced by a protocol client or connector.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The transport is not connected.
    #[error("transport not connected")]
    NotConnected,

    /// Establishing the transport failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// An outbound send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Media could not be downloaded or decrypted.
    #[error("media download failed: {0}")]
    MediaDownload(String),

    /// The pairing-code request was rejected.
    #[error("pairing failed: {0}")]
    PairingFailed(String),

    /// Logout did not complete cleanly.
    #[error("logout failed: {0}")]
    LogoutFailed(String),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
