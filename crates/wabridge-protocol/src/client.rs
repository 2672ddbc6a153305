//! Client and connector traits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wabridge_models::{MediaContent, MessageKey, ProtocolEvent, SessionId};

use crate::error::Result;

/// Outbound message body.
#[derive(Debug, Clone)]
pub enum OutgoingContent {
    /// Plain text reply.
    Text(String),
    /// Binary document attachment (sent as a data URI on the wire).
    Document {
        data: Vec<u8>,
        mimetype: String,
        file_name: String,
        caption: Option<String>,
    },
}

/// Options applied to an outbound send.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Message the send replies to, if any.
    pub quoted: Option<MessageKey>,
    /// Pause applied before handing the message to the transport.
    pub delay: Option<Duration>,
}

impl SendOptions {
    /// Reply to the given message.
    pub fn quoting(key: &MessageKey) -> Self {
        Self {
            quoted: Some(key.clone()),
            delay: None,
        }
    }
}

/// Handle for outbound operations on one session's transport.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Sends a message to a conversation.
    async fn send(&self, jid: &str, content: OutgoingContent, options: SendOptions) -> Result<()>;

    /// Marks the given messages as read.
    async fn read_messages(&self, keys: &[MessageKey]) -> Result<()>;

    /// Downloads and decrypts the media body referenced by a message.
    async fn download_media(&self, key: &MessageKey, media: &MediaContent) -> Result<Vec<u8>>;

    /// Requests a pairing code for out-of-band linking.
    async fn request_pairing_code(&self, phone_number: &str) -> Result<String>;

    /// Invalidates the session's credentials on the server.
    async fn logout(&self) -> Result<()>;

    /// Live transport state.
    fn is_connected(&self) -> bool;
}

/// One established transport: the client handle plus its ordered event
/// stream. Dropping the receiver tears the subscription down.
pub struct Connection {
    pub client: Arc<dyn ProtocolClient>,
    pub events: mpsc::Receiver<ProtocolEvent>,
    /// Whether stored credentials already bind this session to an
    /// account. Unregistered sessions go through the QR/pairing flow.
    pub registered: bool,
}

/// Parameters for opening a transport.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub session_id: SessionId,
    /// Previously persisted authentication material, if any.
    pub credentials: Option<serde_json::Value>,
}

/// Factory opening one transport per session.
#[async_trait]
pub trait ProtocolConnector: Send + Sync {
    async fn connect(&self, options: ConnectOptions) -> Result<Connection>;
}
