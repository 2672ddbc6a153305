//! Shared fixtures for session integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use url::Url;

use wabridge_models::{MediaContent, MessageContent, MessageEnvelope, MessageKey};
use wabridge_protocol::testing::ScriptedConnector;
use wabridge_sessions::{GatewayConfig, SessionRegistry};
use wabridge_store::FsCredentialStore;

pub const GROUP: &str = "120363042@g.us";
pub const AUTHORIZED: &str = "6285212870484";

pub struct Harness {
    pub registry: SessionRegistry,
    pub connector: Arc<ScriptedConnector>,
    pub credentials: Arc<FsCredentialStore>,
    // Held for the lifetime of the test so session files stay around.
    #[allow(dead_code)]
    pub dir: TempDir,
}

/// Builds a registry wired to a scripted connector and a temp sessions
/// directory.
pub fn harness(connector: ScriptedConnector, mut config: GatewayConfig) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    config.sessions_dir = dir.path().to_path_buf();

    let connector = Arc::new(connector);
    let credentials = Arc::new(FsCredentialStore::new(dir.path()));
    let registry = SessionRegistry::new(config, connector.clone(), credentials.clone());

    Harness {
        registry,
        connector,
        credentials,
        dir,
    }
}

/// Config pointing the webhook at a mock server, allowing all events.
pub fn webhook_config(webhook_uri: &str) -> GatewayConfig {
    GatewayConfig {
        webhook_url: Some(Url::parse(&format!("{webhook_uri}/webhook")).expect("webhook url")),
        webhook_allowed_events: wabridge_webhook::EventFilter::allow_all(),
        ..GatewayConfig::default()
    }
}

/// Polls an async predicate until it holds or two seconds pass.
pub async fn eventually<F, Fut>(what: &str, predicate: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if predicate().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held: {what}");
}

pub fn group_key(message_id: &str, sender_number: &str) -> MessageKey {
    MessageKey {
        remote_jid: GROUP.to_string(),
        id: message_id.to_string(),
        from_me: false,
        participant: Some("777@lid".to_string()),
        participant_alt: Some(format!("{sender_number}@s.whatsapp.net")),
    }
}

pub fn text_message(message_id: &str, sender_number: &str, text: &str) -> MessageEnvelope {
    MessageEnvelope {
        key: group_key(message_id, sender_number),
        content: MessageContent::Conversation(text.to_string()),
        timestamp: chrono::Utc::now().timestamp(),
        push_name: Some("Bu Sari".to_string()),
        status: None,
    }
}

pub fn direct_image(message_id: &str) -> MessageEnvelope {
    MessageEnvelope {
        key: MessageKey {
            remote_jid: "628999@s.whatsapp.net".to_string(),
            id: message_id.to_string(),
            from_me: false,
            participant: None,
            participant_alt: None,
        },
        content: MessageContent::Image(MediaContent {
            mimetype: "image/jpeg".to_string(),
            ..Default::default()
        }),
        timestamp: chrono::Utc::now().timestamp(),
        push_name: None,
        status: None,
    }
}
