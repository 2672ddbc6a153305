//! Scripted in-memory protocol implementation for tests.
//!
//! Each [`ScriptedConnector::connect`] call produces a fresh
//! [`ScriptedLink`]: the test pushes protocol events through the link and
//! inspects the messages the code under test sent back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wabridge_models::{MediaContent, MessageKey, ProtocolEvent, SessionId};

use crate::client::{
    ConnectOptions, Connection, OutgoingContent, ProtocolClient, ProtocolConnector, SendOptions,
};
use crate::error::{ProtocolError, Result};

/// A message recorded by a [`ScriptedClient`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub jid: String,
    pub content: OutgoingContent,
    pub quoted: Option<MessageKey>,
}

impl SentMessage {
    /// Text body of the recorded message, if it was a text send.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            OutgoingContent::Text(text) => Some(text),
            OutgoingContent::Document { .. } => None,
        }
    }
}

/// In-memory protocol client that records outbound operations.
pub struct ScriptedClient {
    session_id: SessionId,
    connected: AtomicBool,
    logged_out: AtomicBool,
    pairing_code: Mutex<Option<String>>,
    sent: Mutex<Vec<SentMessage>>,
    read_batches: Mutex<Vec<Vec<MessageKey>>>,
    pairing_requests: Mutex<Vec<String>>,
    media: Mutex<HashMap<String, Vec<u8>>>,
}

impl ScriptedClient {
    fn new(session_id: SessionId, pairing_code: Option<String>) -> Self {
        Self {
            session_id,
            connected: AtomicBool::new(false),
            logged_out: AtomicBool::new(false),
            pairing_code: Mutex::new(pairing_code),
            sent: Mutex::new(Vec::new()),
            read_batches: Mutex::new(Vec::new()),
            pairing_requests: Mutex::new(Vec::new()),
            media: Mutex::new(HashMap::new()),
        }
    }

    /// A client detached from any connector, for exercising code that
    /// only needs a [`ProtocolClient`].
    pub fn standalone(session_id: SessionId) -> Arc<Self> {
        let client = Arc::new(Self::new(session_id, None));
        client.set_connected(true);
        client
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    /// Registers downloadable media for a message id.
    pub fn put_media(&self, message_id: impl Into<String>, bytes: Vec<u8>) {
        self.media.lock().unwrap().insert(message_id.into(), bytes);
    }

    /// Messages sent through this client so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Key batches passed to `read_messages`.
    pub fn read_batches(&self) -> Vec<Vec<MessageKey>> {
        self.read_batches.lock().unwrap().clone()
    }

    /// Phone numbers a pairing code was requested for.
    pub fn pairing_requests(&self) -> Vec<String> {
        self.pairing_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProtocolClient for ScriptedClient {
    async fn send(&self, jid: &str, content: OutgoingContent, options: SendOptions) -> Result<()> {
        if let Some(delay) = options.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(SentMessage {
            jid: jid.to_string(),
            content,
            quoted: options.quoted,
        });
        Ok(())
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<()> {
        self.read_batches.lock().unwrap().push(keys.to_vec());
        Ok(())
    }

    async fn download_media(&self, key: &MessageKey, _media: &MediaContent) -> Result<Vec<u8>> {
        self.media
            .lock()
            .unwrap()
            .get(&key.id)
            .cloned()
            .ok_or_else(|| ProtocolError::MediaDownload(format!("no media for {}", key.id)))
    }

    async fn request_pairing_code(&self, phone_number: &str) -> Result<String> {
        self.pairing_requests
            .lock()
            .unwrap()
            .push(phone_number.to_string());
        self.pairing_code
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProtocolError::PairingFailed("no pairing code scripted".to_string()))
    }

    async fn logout(&self) -> Result<()> {
        self.logged_out.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// One connect attempt: the produced client plus the event sender the
/// test drives it with.
#[derive(Clone)]
pub struct ScriptedLink {
    pub client: Arc<ScriptedClient>,
    events: mpsc::Sender<ProtocolEvent>,
    pub credentials: Option<serde_json::Value>,
}

impl ScriptedLink {
    /// Delivers an event to the session's router. Returns false once the
    /// router has torn the subscription down.
    pub async fn emit(&self, event: ProtocolEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}

/// Connector producing one [`ScriptedLink`] per connect call.
#[derive(Default)]
pub struct ScriptedConnector {
    registered: AtomicBool,
    pairing_code: Mutex<Option<String>>,
    links: Mutex<Vec<ScriptedLink>>,
}

impl ScriptedConnector {
    /// A connector whose sessions resume from stored credentials.
    pub fn registered() -> Self {
        let connector = Self::default();
        connector.registered.store(true, Ordering::SeqCst);
        connector
    }

    /// A connector whose sessions require QR/pairing-code linking.
    pub fn unregistered() -> Self {
        Self::default()
    }

    /// Sets the pairing code future clients hand out.
    pub fn with_pairing_code(self, code: impl Into<String>) -> Self {
        *self.pairing_code.lock().unwrap() = Some(code.into());
        self
    }

    /// Number of connect attempts so far.
    pub fn attempts(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    /// Waits until the `index`-th connect attempt has happened.
    ///
    /// # Panics
    ///
    /// Panics after two seconds without the attempt materializing.
    pub async fn link(&self, index: usize) -> ScriptedLink {
        for _ in 0..200 {
            if let Some(link) = self.links.lock().unwrap().get(index).cloned() {
                return link;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("connect attempt {index} never happened");
    }
}

#[async_trait]
impl ProtocolConnector for ScriptedConnector {
    async fn connect(&self, options: ConnectOptions) -> Result<Connection> {
        let (tx, rx) = mpsc::channel(64);
        let client = Arc::new(ScriptedClient::new(
            options.session_id,
            self.pairing_code.lock().unwrap().clone(),
        ));
        self.links.lock().unwrap().push(ScriptedLink {
            client: Arc::clone(&client),
            events: tx,
            credentials: options.credentials,
        });
        Ok(Connection {
            client,
            events: rx,
            registered: self.registered.load(Ordering::SeqCst),
        })
    }
}
