//! Per-session event routing.
//!
//! One router task per session consumes the transport's event stream in
//! order and fans each event class out to the message store, the command
//! interpreter, the webhook dispatcher, and the reconnect policy. Heavy
//! work (media downloads, interpreter calls) suspends only this session's
//! loop; other sessions keep processing.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use wabridge_models::{
    aggregate_poll_votes, BatchKind, ConnectionState, ConnectionUpdate, MessageContent,
    MessageEnvelope, MessageKey, MessageStatus, MessageUpdate, ProtocolEvent, ReceiptUpdate,
    SessionId, WebhookEvent,
};
use wabridge_protocol::{Connection, ProtocolClient};

use crate::reconnect::ReconnectDecision;
use crate::registry::{AuthOutcome, SessionHandle, Shared};

/// Messages older than this relative to router time are history replayed
/// on reconnect and must not be reprocessed.
const FRESHNESS_THRESHOLD_SECS: i64 = 60;

/// Whether the router loop keeps running after an event.
#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

/// Runs the router loop for one session until the transport closes or
/// the session is torn down.
pub(crate) async fn run(shared: Arc<Shared>, id: SessionId, connection: Connection) {
    let Connection {
        client,
        mut events,
        registered,
    } = connection;

    while let Some(event) = events.recv().await {
        // A response arriving after deletion is discarded, not applied.
        let Some(handle) = shared.get(&id).await else {
            debug!(session_id = %id, "Session gone; discarding event");
            break;
        };

        let flow = match event {
            ProtocolEvent::CredsUpdate(credentials) => {
                persist_credentials(&shared, &id, credentials);
                Flow::Continue
            }
            ProtocolEvent::Connection(update) => {
                handle_connection_update(&shared, &id, client.as_ref(), registered, update).await
            }
            ProtocolEvent::MessagesUpsert { kind, messages } => {
                handle_messages_upsert(&shared, &id, &handle, &client, kind, messages).await;
                Flow::Continue
            }
            ProtocolEvent::MessagesUpdate(updates) => {
                handle_messages_update(&shared, &id, &handle, updates).await;
                Flow::Continue
            }
            ProtocolEvent::MessageReceipts(receipts) => {
                handle_receipts(&shared, &id, &handle, receipts).await;
                Flow::Continue
            }
            ProtocolEvent::Mutation { kind, payload } => {
                handle.store().apply_mutation(kind, &payload).await;
                shared.webhook.dispatch(&id, kind.webhook_event(), payload);
                Flow::Continue
            }
        };

        if flow == Flow::Stop {
            break;
        }
    }

    debug!(session_id = %id, "Router stopped");
}

/// Credential saves are fire-and-forget so they never block the stream.
fn persist_credentials(shared: &Arc<Shared>, id: &SessionId, credentials: Value) {
    let store = Arc::clone(&shared.credentials);
    let id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = store.save(&id, &credentials).await {
            warn!(session_id = %id, error = %e, "Failed to persist credentials");
        }
    });
}

async fn handle_connection_update(
    shared: &Arc<Shared>,
    id: &SessionId,
    client: &dyn ProtocolClient,
    registered: bool,
    update: ConnectionUpdate,
) -> Flow {
    // Always forwarded, whatever the outcome below.
    if let Ok(payload) = serde_json::to_value(&update) {
        shared
            .webhook
            .dispatch(id, WebhookEvent::ConnectionUpdate, payload);
    }

    if let Some(qr) = update.qr.as_deref() {
        return handle_qr(shared, id, client, registered, qr).await;
    }

    match update.connection {
        Some(ConnectionState::Open) => {
            info!(session_id = %id, "Session connected");
            shared.clear_attempts(id);
            shared.resolve_waiter(id, AuthOutcome::Connected);
            Flow::Continue
        }
        Some(ConnectionState::Close) => {
            let attempts = shared.attempts(id);
            match shared.policy.decide(update.disconnect_reason, attempts) {
                ReconnectDecision::Drop => {
                    info!(
                        session_id = %id,
                        reason = ?update.disconnect_reason,
                        attempts,
                        "Session closed terminally"
                    );
                    shared.fail_waiter(id, "unable to create session");
                    Shared::delete(shared, id).await;
                    Flow::Stop
                }
                ReconnectDecision::Retry { delay } => {
                    let attempts = shared.bump_attempts(id);
                    info!(session_id = %id, attempts, "Reconnecting");
                    Shared::schedule_reconnect(Arc::clone(shared), id.clone(), delay);
                    Flow::Stop
                }
            }
        }
        _ => Flow::Continue,
    }
}

/// QR handling: a pairing-code waiter gets a code requested exactly
/// once; a QR waiter gets the payload once; with nobody waiting the
/// credentials are invalid and no human is present to scan, so the
/// session logs out and is deleted.
async fn handle_qr(
    shared: &Arc<Shared>,
    id: &SessionId,
    client: &dyn ProtocolClient,
    registered: bool,
    qr: &str,
) -> Flow {
    if !registered {
        if let Some(phone) = shared.pairing_phone_to_request(id) {
            match client.request_pairing_code(&phone).await {
                Ok(code) => {
                    info!(session_id = %id, "Pairing code issued");
                    shared.resolve_waiter(id, AuthOutcome::PairingCode(code));
                }
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Pairing code request failed");
                    shared.fail_waiter(id, "unable to create session");
                }
            }
            return Flow::Continue;
        }
    }

    shared
        .webhook
        .dispatch(id, WebhookEvent::QrcodeUpdated, json!({ "qr": qr }));

    if shared.has_waiter(id) {
        shared.resolve_waiter(id, AuthOutcome::Qr(qr.to_string()));
        return Flow::Continue;
    }

    if let Err(e) = client.logout().await {
        warn!(session_id = %id, error = %e, "Logout after unconsumed QR failed");
    }
    Shared::delete(shared, id).await;
    Flow::Stop
}

async fn handle_messages_upsert(
    shared: &Arc<Shared>,
    id: &SessionId,
    handle: &Arc<SessionHandle>,
    client: &Arc<dyn ProtocolClient>,
    kind: BatchKind,
    messages: Vec<MessageEnvelope>,
) {
    // Index everything, history included, for later update resolution.
    handle.store().remember(&messages).await;

    if kind != BatchKind::Notify {
        return;
    }

    let now = Utc::now().timestamp();
    let fresh: Vec<MessageEnvelope> = messages
        .into_iter()
        .filter(|m| !m.key.from_me)
        .filter(|m| !m.is_stale(now, FRESHNESS_THRESHOLD_SECS))
        .collect();
    if fresh.is_empty() {
        return;
    }

    if shared.config.auto_mark_read {
        let keys: Vec<MessageKey> = fresh.iter().map(|m| m.key.clone()).collect();
        match client.read_messages(&keys).await {
            Ok(()) => debug!(session_id = %id, count = keys.len(), "Marked messages as read"),
            Err(e) => warn!(session_id = %id, error = %e, "Failed to mark messages as read"),
        }
    }

    let mut payload = Vec::with_capacity(fresh.len());
    for mut message in fresh {
        if message.is_group()
            && (message.text().is_some()
                || matches!(message.content, MessageContent::Image(_)))
            && shared.interpreter.handle(client.as_ref(), &message).await
        {
            // Consumed as a command; keep it out of the webhook payload.
            continue;
        }

        // The interpreter suspends; the session may be gone by now.
        if shared.get(id).await.is_none() {
            return;
        }

        if shared.config.media_in_base64 {
            enrich_media(client.as_ref(), &mut message).await;
        }
        payload.push(message);
    }

    if payload.is_empty() {
        return;
    }
    match serde_json::to_value(&payload) {
        Ok(value) => {
            shared.webhook.dispatch(id, WebhookEvent::MessagesUpsert, value);
        }
        Err(e) => warn!(session_id = %id, error = %e, "Failed to serialize message batch"),
    }
}

/// Attaches the full media body as base64. Failure degrades to the
/// unenriched message.
async fn enrich_media(client: &dyn ProtocolClient, message: &mut MessageEnvelope) {
    let Some(media) = message.content.media() else {
        return;
    };
    match client.download_media(&message.key, media).await {
        Ok(bytes) => {
            if let Some(media) = message.content.media_mut() {
                media.file_base64 = Some(BASE64.encode(bytes));
            }
        }
        Err(e) => {
            warn!(message_id = %message.key.id, error = %e, "Media enrichment failed");
        }
    }
}

/// Resolves message updates against the store; updates whose original
/// message is unknown are dropped.
async fn handle_messages_update(
    shared: &Arc<Shared>,
    id: &SessionId,
    handle: &Arc<SessionHandle>,
    updates: Vec<MessageUpdate>,
) {
    for MessageUpdate { key, mut update } in updates {
        let Some(original) = handle.store().load_message(&key.remote_jid, &key.id).await else {
            continue;
        };

        humanize_status(&mut update);
        let item = json!([{
            "key": key,
            "update": update,
            "message": original.content,
        }]);
        shared.webhook.dispatch(id, WebhookEvent::MessagesUpdate, item);
    }
}

/// Replaces a numeric status code with its symbolic name.
fn humanize_status(update: &mut Value) {
    let Some(code) = update.get("status").and_then(Value::as_u64) else {
        return;
    };
    if let Some(status) = u8::try_from(code).ok().and_then(MessageStatus::from_code) {
        if let Ok(value) = serde_json::to_value(status) {
            update["status"] = value;
        }
    }
}

/// Attaches aggregated vote tallies to poll receipts. Receipts whose
/// poll message cannot be found are forwarded unmodified.
async fn handle_receipts(
    shared: &Arc<Shared>,
    id: &SessionId,
    handle: &Arc<SessionHandle>,
    mut receipts: Vec<ReceiptUpdate>,
) {
    for receipt in &mut receipts {
        let Some(poll_updates) = receipt.update.poll_updates.as_mut() else {
            continue;
        };
        let original = handle
            .store()
            .load_message(&receipt.key.remote_jid, &receipt.key.id)
            .await;
        let Some(MessageContent::Poll(poll)) = original.map(|m| m.content) else {
            continue;
        };

        let tallies = aggregate_poll_votes(&poll, poll_updates);
        for poll_update in poll_updates.iter_mut() {
            poll_update.vote = Some(tallies.clone());
        }
    }

    match serde_json::to_value(&receipts) {
        Ok(value) => {
            shared
                .webhook
                .dispatch(id, WebhookEvent::MessagesReceiptUpdate, value);
        }
        Err(e) => warn!(session_id = %id, error = %e, "Failed to serialize receipts"),
    }
}
