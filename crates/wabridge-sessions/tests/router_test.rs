//! Event-to-webhook translation: live-batch filtering, command routing,
//! media enrichment, store resolution, and verbatim mutation forwarding.

mod common;

use std::time::Duration;

use common::{direct_image, eventually, group_key, harness, text_message, webhook_config, AUTHORIZED};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wabridge_commands::{ApiConfig, InterpreterConfig};
use wabridge_models::{
    BatchKind, ConnectionUpdate, MessageContent, MessageEnvelope, MessageUpdate, MutationKind,
    PollContent, PollOption, PollUpdate, ProtocolEvent, ReceiptContent, ReceiptUpdate, SessionId,
};
use wabridge_protocol::testing::{ScriptedConnector, ScriptedLink};
use wabridge_sessions::{AuthOptions, GatewayConfig};

/// Collects webhook bodies of one event type received so far.
async fn webhook_bodies(server: &MockServer, event_type: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
        .filter(|v| v["type"] == event_type)
        .collect()
}

/// Waits until at least `min` webhook bodies of the event type arrived.
async fn wait_for_webhook(server: &MockServer, event_type: &str, min: usize) -> Vec<Value> {
    for _ in 0..200 {
        let bodies = webhook_bodies(server, event_type).await;
        if bodies.len() >= min {
            return bodies;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("webhook event {event_type} not received");
}

async fn webhook_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

/// Boots a connected session against a webhook mock.
async fn session(config: GatewayConfig) -> (common::Harness, ScriptedLink, SessionId) {
    let h = harness(ScriptedConnector::registered(), config);
    let id = SessionId::from("s1");
    let _handoff = h
        .registry
        .create(id.clone(), AuthOptions::default())
        .await
        .unwrap();
    let link = h.connector.link(0).await;
    (h, link, id)
}

#[tokio::test]
async fn live_batch_is_filtered_marked_read_and_forwarded() {
    let webhook = webhook_server().await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/get_laporan_pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
        .expect(1)
        .mount(&api)
        .await;

    let config = GatewayConfig {
        auto_mark_read: true,
        api: ApiConfig {
            base_url: format!("{}/api", api.uri()),
            api_key: "k".to_string(),
        },
        interpreter: InterpreterConfig {
            authorized_numbers: vec![AUTHORIZED.to_string()],
            report_recipient: None,
        },
        ..webhook_config(&webhook.uri())
    };
    let (_h, link, _id) = session(config).await;

    let now = chrono::Utc::now().timestamp();
    let mut stale = text_message("STALE", AUTHORIZED, "replayed history");
    stale.timestamp = now - 60; // exactly at the freshness boundary
    let mut own = text_message("MINE", AUTHORIZED, "from the bot itself");
    own.key.from_me = true;
    let normal = text_message("FRESH", AUTHORIZED, "selamat pagi");
    let command = text_message("CMD", AUTHORIZED, "#laporan bulanan");

    link.emit(ProtocolEvent::MessagesUpsert {
        kind: BatchKind::Notify,
        messages: vec![stale, own, normal, command],
    })
    .await;

    let bodies = wait_for_webhook(&webhook, "MESSAGES_UPSERT", 1).await;
    let data = bodies[0]["data"].as_array().unwrap();
    // Stale and own messages are filtered; the command was handled and
    // excluded; only the plain fresh message is forwarded.
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["key"]["id"], "FRESH");
    assert_eq!(data[0]["message"]["conversation"], "selamat pagi");
    assert_eq!(bodies[0]["instance"], "s1");

    // The surviving fresh messages (plain + command) were marked read.
    let read = link.client.read_batches();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].len(), 2);

    // The command produced a PDF reply through the protocol client.
    eventually("report reply sent", || async {
        !link.client.sent().is_empty()
    })
    .await;
}

#[tokio::test]
async fn history_batch_is_indexed_but_not_forwarded() {
    let webhook = webhook_server().await;
    let (h, link, id) = session(webhook_config(&webhook.uri())).await;

    link.emit(ProtocolEvent::MessagesUpsert {
        kind: BatchKind::Append,
        messages: vec![text_message("HIST", AUTHORIZED, "old news")],
    })
    .await;

    let handle = h.registry.get(&id).await.unwrap();
    eventually("history indexed", || async {
        handle
            .store()
            .load_message(common::GROUP, "HIST")
            .await
            .is_some()
    })
    .await;

    // Emit a connection update as a fence, then check nothing of the
    // history batch ever reached the webhook.
    link.emit(ProtocolEvent::Connection(ConnectionUpdate::open()))
        .await;
    wait_for_webhook(&webhook, "CONNECTION_UPDATE", 1).await;
    assert!(webhook_bodies(&webhook, "MESSAGES_UPSERT").await.is_empty());
}

#[tokio::test]
async fn mutations_are_forwarded_verbatim_and_feed_the_chat_registry() {
    let webhook = webhook_server().await;
    let (h, link, id) = session(webhook_config(&webhook.uri())).await;

    let chats = json!([{"id": "120363042@g.us", "name": "Guru 7H"}]);
    link.emit(ProtocolEvent::Mutation {
        kind: MutationKind::ChatsUpsert,
        payload: chats.clone(),
    })
    .await;

    let bodies = wait_for_webhook(&webhook, "CHATS_UPSERT", 1).await;
    assert_eq!(bodies[0]["data"], chats);

    let handle = h.registry.get(&id).await.unwrap();
    let groups = handle.store().chat_list(true).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["name"], "Guru 7H");
}

#[tokio::test]
async fn message_update_resolves_original_from_store() {
    let webhook = webhook_server().await;
    let (_h, link, _id) = session(webhook_config(&webhook.uri())).await;

    // Index via a history batch so no MESSAGES_UPSERT webhook fires.
    link.emit(ProtocolEvent::MessagesUpsert {
        kind: BatchKind::Append,
        messages: vec![text_message("KNOWN", AUTHORIZED, "tracked")],
    })
    .await;

    link.emit(ProtocolEvent::MessagesUpdate(vec![
        MessageUpdate {
            key: group_key("UNKNOWN", AUTHORIZED),
            update: json!({"status": 4}),
        },
        MessageUpdate {
            key: group_key("KNOWN", AUTHORIZED),
            update: json!({"status": 4}),
        },
    ]))
    .await;

    let bodies = wait_for_webhook(&webhook, "MESSAGES_UPDATE", 1).await;
    // The unknown message's update is dropped entirely.
    assert_eq!(bodies.len(), 1);
    let item = &bodies[0]["data"][0];
    assert_eq!(item["key"]["id"], "KNOWN");
    assert_eq!(item["update"]["status"], "READ");
    assert_eq!(item["message"]["conversation"], "tracked");
}

#[tokio::test]
async fn poll_receipts_carry_aggregated_tallies() {
    let webhook = webhook_server().await;
    let (_h, link, _id) = session(webhook_config(&webhook.uri())).await;

    let poll = MessageEnvelope {
        key: group_key("POLL", AUTHORIZED),
        content: MessageContent::Poll(PollContent {
            name: "Makan siang?".to_string(),
            options: vec![
                PollOption {
                    option_name: "Nasi".to_string(),
                },
                PollOption {
                    option_name: "Soto".to_string(),
                },
            ],
            selectable_options_count: Some(1),
        }),
        timestamp: chrono::Utc::now().timestamp(),
        push_name: None,
        status: None,
    };
    link.emit(ProtocolEvent::MessagesUpsert {
        kind: BatchKind::Append,
        messages: vec![poll],
    })
    .await;

    link.emit(ProtocolEvent::MessageReceipts(vec![ReceiptUpdate {
        key: group_key("POLL", AUTHORIZED),
        message_timestamp: None,
        push_name: None,
        broadcast: None,
        update: ReceiptContent {
            poll_updates: Some(vec![
                PollUpdate {
                    voter: Some("a@s.whatsapp.net".to_string()),
                    selected_options: vec!["Nasi".to_string()],
                    vote: None,
                },
                PollUpdate {
                    voter: Some("b@s.whatsapp.net".to_string()),
                    selected_options: vec!["Nasi".to_string()],
                    vote: None,
                },
            ]),
            rest: serde_json::Map::new(),
        },
    }]))
    .await;

    let bodies = wait_for_webhook(&webhook, "MESSAGES_RECEIPT_UPDATE", 1).await;
    let vote = &bodies[0]["data"][0]["update"]["pollUpdates"][0]["vote"];
    assert_eq!(vote[0]["name"], "Nasi");
    assert_eq!(vote[0]["voters"], 2);
    assert_eq!(vote[1]["name"], "Soto");
    assert_eq!(vote[1]["voters"], 0);
}

#[tokio::test]
async fn receipt_for_unknown_poll_is_forwarded_unmodified() {
    let webhook = webhook_server().await;
    let (_h, link, _id) = session(webhook_config(&webhook.uri())).await;

    link.emit(ProtocolEvent::MessageReceipts(vec![ReceiptUpdate {
        key: group_key("MISSING", AUTHORIZED),
        message_timestamp: None,
        push_name: None,
        broadcast: None,
        update: ReceiptContent {
            poll_updates: Some(vec![PollUpdate {
                voter: None,
                selected_options: vec!["Nasi".to_string()],
                vote: None,
            }]),
            rest: serde_json::Map::new(),
        },
    }]))
    .await;

    let bodies = wait_for_webhook(&webhook, "MESSAGES_RECEIPT_UPDATE", 1).await;
    let poll_update = &bodies[0]["data"][0]["update"]["pollUpdates"][0];
    assert!(poll_update.get("vote").is_none());
}

#[tokio::test]
async fn media_is_embedded_as_base64_when_enabled() {
    let webhook = webhook_server().await;
    let config = GatewayConfig {
        media_in_base64: true,
        ..webhook_config(&webhook.uri())
    };
    let (_h, link, _id) = session(config).await;

    link.client.put_media("IMG", vec![0xFF, 0xD8]);
    link.emit(ProtocolEvent::MessagesUpsert {
        kind: BatchKind::Notify,
        messages: vec![direct_image("IMG")],
    })
    .await;

    let bodies = wait_for_webhook(&webhook, "MESSAGES_UPSERT", 1).await;
    let message = &bodies[0]["data"][0]["message"]["imageMessage"];
    assert_eq!(message["fileBase64"], "/9g=");
}

#[tokio::test]
async fn failed_media_download_degrades_to_unenriched_message() {
    let webhook = webhook_server().await;
    let config = GatewayConfig {
        media_in_base64: true,
        ..webhook_config(&webhook.uri())
    };
    let (_h, link, _id) = session(config).await;

    // No media registered: the download fails, the message still flows.
    link.emit(ProtocolEvent::MessagesUpsert {
        kind: BatchKind::Notify,
        messages: vec![direct_image("IMG")],
    })
    .await;

    let bodies = wait_for_webhook(&webhook, "MESSAGES_UPSERT", 1).await;
    let message = &bodies[0]["data"][0]["message"]["imageMessage"];
    assert!(message.get("fileBase64").is_none());
}

#[tokio::test]
async fn credential_updates_are_persisted_fire_and_forget() {
    let webhook = webhook_server().await;
    let (h, link, id) = session(webhook_config(&webhook.uri())).await;

    link.emit(ProtocolEvent::CredsUpdate(json!({"noiseKey": "fresh"})))
        .await;

    eventually("credentials persisted", || async {
        use wabridge_store::CredentialStore as _;
        h.credentials
            .load(&id)
            .await
            .ok()
            .flatten()
            .is_some_and(|c| c["noiseKey"] == "fresh")
    })
    .await;
}

#[tokio::test]
async fn connection_updates_are_always_forwarded() {
    let webhook = webhook_server().await;
    let (_h, link, _id) = session(webhook_config(&webhook.uri())).await;

    link.emit(ProtocolEvent::Connection(ConnectionUpdate::open()))
        .await;

    let bodies = wait_for_webhook(&webhook, "CONNECTION_UPDATE", 1).await;
    assert_eq!(bodies[0]["data"]["connection"], "open");
}

#[tokio::test]
async fn shutdown_persists_message_stores() {
    let webhook = webhook_server().await;
    let (h, link, id) = session(webhook_config(&webhook.uri())).await;

    link.emit(ProtocolEvent::MessagesUpsert {
        kind: BatchKind::Append,
        messages: vec![text_message("KEEP", AUTHORIZED, "persist me")],
    })
    .await;

    let handle = h.registry.get(&id).await.unwrap();
    eventually("message indexed", || async {
        handle
            .store()
            .load_message(common::GROUP, "KEEP")
            .await
            .is_some()
    })
    .await;

    h.registry.shutdown().await;

    use wabridge_store::CredentialStore as _;
    let store_path = h.credentials.message_store_path(&id);
    assert!(store_path.exists());
}
