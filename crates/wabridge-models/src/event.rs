//! Typed protocol event enumeration.
//!
//! The underlying protocol library surfaces one callback per event name.
//! Here every event class is a variant of [`ProtocolEvent`], consumed by a
//! single per-session dispatch loop, which keeps per-session ordering
//! explicit and the routing logic testable.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{MessageEnvelope, MessageKey};
use crate::poll::PollUpdate;

/// Transport connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Reason code attached to a transport-level close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Credentials were invalidated; the session cannot recover.
    LoggedOut,
    ConnectionClosed,
    ConnectionLost,
    ConnectionReplaced,
    TimedOut,
    BadSession,
    /// The transport asks for an immediate reconnect.
    RestartRequired,
    MultideviceMismatch,
    Unknown,
}

impl DisconnectReason {
    /// Maps the protocol's HTTP-style status code to a reason.
    pub fn from_code(code: u16) -> Self {
        match code {
            401 => Self::LoggedOut,
            408 => Self::TimedOut,
            411 => Self::MultideviceMismatch,
            428 => Self::ConnectionClosed,
            440 => Self::ConnectionReplaced,
            500 => Self::BadSession,
            515 => Self::RestartRequired,
            _ => Self::Unknown,
        }
    }

    /// True when the close is terminal and the session must be deleted.
    pub fn is_logged_out(self) -> bool {
        matches!(self, Self::LoggedOut)
    }

    /// True when the reconnect should happen without delay.
    pub fn wants_immediate_restart(self) -> bool {
        matches!(self, Self::RestartRequired)
    }
}

/// A connection-state update from the transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionState>,
    /// Fresh QR payload, emitted while the session is unauthenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnect_reason: Option<DisconnectReason>,
}

impl ConnectionUpdate {
    pub fn open() -> Self {
        Self {
            connection: Some(ConnectionState::Open),
            ..Default::default()
        }
    }

    pub fn close(reason: DisconnectReason) -> Self {
        Self {
            connection: Some(ConnectionState::Close),
            disconnect_reason: Some(reason),
            ..Default::default()
        }
    }

    pub fn qr(payload: impl Into<String>) -> Self {
        Self {
            qr: Some(payload.into()),
            ..Default::default()
        }
    }
}

/// Whether a message batch is freshly arriving or replayed history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    /// Live delivery; the only kind the router processes.
    Notify,
    /// History backfill appended during sync.
    Append,
}

/// A partial update to an already-delivered message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageUpdate {
    pub key: MessageKey,
    /// Raw update fields, forwarded verbatim after status humanization.
    pub update: Value,
}

/// Receipt payload attached to a [`ReceiptUpdate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_updates: Option<Vec<PollUpdate>>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

/// A message-receipt update (delivery/read acknowledgements, poll votes).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptUpdate {
    pub key: MessageKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<bool>,
    pub update: ReceiptContent,
}

/// Event classes forwarded verbatim to the webhook destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    ChatsSet,
    ChatsUpsert,
    ChatsUpdate,
    ChatsDelete,
    ContactsSet,
    ContactsUpsert,
    ContactsUpdate,
    GroupsUpsert,
    GroupsUpdate,
    GroupParticipantsUpdate,
    PresenceUpdate,
    BlocklistSet,
    BlocklistUpdate,
    LabelsAssociation,
    LabelsEdit,
    MessagesDelete,
    MessagesReaction,
    MessagesMediaUpdate,
    MessagingHistorySet,
}

impl MutationKind {
    /// The webhook event tag this mutation is dispatched under.
    pub fn webhook_event(self) -> WebhookEvent {
        match self {
            Self::ChatsSet => WebhookEvent::ChatsSet,
            Self::ChatsUpsert => WebhookEvent::ChatsUpsert,
            Self::ChatsUpdate => WebhookEvent::ChatsUpdate,
            Self::ChatsDelete => WebhookEvent::ChatsDelete,
            Self::ContactsSet => WebhookEvent::ContactsSet,
            Self::ContactsUpsert => WebhookEvent::ContactsUpsert,
            Self::ContactsUpdate => WebhookEvent::ContactsUpdate,
            Self::GroupsUpsert => WebhookEvent::GroupsUpsert,
            Self::GroupsUpdate => WebhookEvent::GroupsUpdate,
            Self::GroupParticipantsUpdate => WebhookEvent::GroupParticipantsUpdate,
            Self::PresenceUpdate => WebhookEvent::PresenceUpdate,
            Self::BlocklistSet => WebhookEvent::BlocklistSet,
            Self::BlocklistUpdate => WebhookEvent::BlocklistUpdate,
            Self::LabelsAssociation => WebhookEvent::LabelsAssociation,
            Self::LabelsEdit => WebhookEvent::LabelsEdit,
            Self::MessagesDelete => WebhookEvent::MessagesDelete,
            Self::MessagesReaction => WebhookEvent::MessagesReaction,
            Self::MessagesMediaUpdate => WebhookEvent::MessagesMediaUpdate,
            Self::MessagingHistorySet => WebhookEvent::MessagingHistorySet,
        }
    }
}

/// One event emitted by a session's protocol transport.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    /// Authentication material changed and must be persisted.
    CredsUpdate(Value),
    /// Connection lifecycle change, QR issuance, or disconnect.
    Connection(ConnectionUpdate),
    /// A batch of inbound messages.
    MessagesUpsert {
        kind: BatchKind,
        messages: Vec<MessageEnvelope>,
    },
    /// Partial updates to known messages.
    MessagesUpdate(Vec<MessageUpdate>),
    /// Delivery receipts, possibly carrying poll votes.
    MessageReceipts(Vec<ReceiptUpdate>),
    /// Everything else, forwarded verbatim under a fixed tag.
    Mutation { kind: MutationKind, payload: Value },
}

/// Outbound webhook event tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookEvent {
    ChatsSet,
    ChatsUpsert,
    ChatsUpdate,
    ChatsDelete,
    ContactsSet,
    ContactsUpsert,
    ContactsUpdate,
    GroupsUpsert,
    GroupsUpdate,
    GroupParticipantsUpdate,
    PresenceUpdate,
    BlocklistSet,
    BlocklistUpdate,
    LabelsAssociation,
    LabelsEdit,
    MessagesUpsert,
    MessagesDelete,
    MessagesUpdate,
    MessagesReceiptUpdate,
    MessagesReaction,
    MessagesMediaUpdate,
    MessagingHistorySet,
    ConnectionUpdate,
    QrcodeUpdated,
}

impl WebhookEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatsSet => "CHATS_SET",
            Self::ChatsUpsert => "CHATS_UPSERT",
            Self::ChatsUpdate => "CHATS_UPDATE",
            Self::ChatsDelete => "CHATS_DELETE",
            Self::ContactsSet => "CONTACTS_SET",
            Self::ContactsUpsert => "CONTACTS_UPSERT",
            Self::ContactsUpdate => "CONTACTS_UPDATE",
            Self::GroupsUpsert => "GROUPS_UPSERT",
            Self::GroupsUpdate => "GROUPS_UPDATE",
            Self::GroupParticipantsUpdate => "GROUP_PARTICIPANTS_UPDATE",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::BlocklistSet => "BLOCKLIST_SET",
            Self::BlocklistUpdate => "BLOCKLIST_UPDATE",
            Self::LabelsAssociation => "LABELS_ASSOCIATION",
            Self::LabelsEdit => "LABELS_EDIT",
            Self::MessagesUpsert => "MESSAGES_UPSERT",
            Self::MessagesDelete => "MESSAGES_DELETE",
            Self::MessagesUpdate => "MESSAGES_UPDATE",
            Self::MessagesReceiptUpdate => "MESSAGES_RECEIPT_UPDATE",
            Self::MessagesReaction => "MESSAGES_REACTION",
            Self::MessagesMediaUpdate => "MESSAGES_MEDIA_UPDATE",
            Self::MessagingHistorySet => "MESSAGING_HISTORY_SET",
            Self::ConnectionUpdate => "CONNECTION_UPDATE",
            Self::QrcodeUpdated => "QRCODE_UPDATED",
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
