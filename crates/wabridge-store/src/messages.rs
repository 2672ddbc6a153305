//! Bounded in-memory message index with JSON persistence.
//!
//! The store keeps the most recent messages per conversation so the
//! router can resolve "what was this update about" when an update event
//! arrives without a message body, and tracks the chat registry fed by
//! chat mutations.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use wabridge_models::{jid, MessageEnvelope, MutationKind};

use crate::atomic::{atomic_write_json, read_json_optional};
use crate::error::Result;

/// Default cap on retained messages per conversation.
pub const DEFAULT_MAX_MESSAGES_PER_CHAT: usize = 150;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    /// Chat payloads by chat JID, as last seen in chat mutations.
    chats: HashMap<String, Value>,
    /// Recent messages per chat JID, oldest first.
    messages: HashMap<String, VecDeque<MessageEnvelope>>,
}

/// Per-session message index.
pub struct MessageStore {
    path: PathBuf,
    max_per_chat: usize,
    state: RwLock<StoreState>,
}

impl MessageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, DEFAULT_MAX_MESSAGES_PER_CHAT)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, max_per_chat: usize) -> Self {
        Self {
            path: path.into(),
            max_per_chat,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Indexes a batch of messages, evicting the oldest beyond the cap.
    pub async fn remember(&self, messages: &[MessageEnvelope]) {
        if messages.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        for message in messages {
            let ring = state
                .messages
                .entry(message.key.remote_jid.clone())
                .or_default();
            ring.push_back(message.clone());
            while ring.len() > self.max_per_chat {
                ring.pop_front();
            }
        }
    }

    /// Looks up a stored message by conversation and message id.
    pub async fn load_message(&self, remote_jid: &str, id: &str) -> Option<MessageEnvelope> {
        let state = self.state.read().await;
        state
            .messages
            .get(remote_jid)?
            .iter()
            .rev()
            .find(|m| m.key.id == id)
            .cloned()
    }

    /// Applies a chat mutation to the chat registry. Non-chat mutations
    /// are ignored.
    pub async fn apply_mutation(&self, kind: MutationKind, payload: &Value) {
        match kind {
            MutationKind::ChatsSet | MutationKind::ChatsUpsert | MutationKind::ChatsUpdate => {
                let Some(chats) = payload.as_array() else {
                    return;
                };
                let mut state = self.state.write().await;
                for chat in chats {
                    if let Some(id) = chat.get("id").and_then(Value::as_str) {
                        state.chats.insert(id.to_string(), chat.clone());
                    }
                }
            }
            MutationKind::ChatsDelete => {
                let Some(ids) = payload.as_array() else {
                    return;
                };
                let mut state = self.state.write().await;
                for id in ids.iter().filter_map(Value::as_str) {
                    state.chats.remove(id);
                }
            }
            _ => {}
        }
    }

    /// Chats of one kind, groups or direct conversations.
    pub async fn chat_list(&self, groups: bool) -> Vec<Value> {
        let state = self.state.read().await;
        state
            .chats
            .iter()
            .filter(|(id, _)| jid::is_group(id) == groups)
            .map(|(_, chat)| chat.clone())
            .collect()
    }

    /// Number of indexed messages across all chats.
    pub async fn message_count(&self) -> usize {
        let state = self.state.read().await;
        state.messages.values().map(VecDeque::len).sum()
    }

    /// Loads previously persisted state. Missing file is a fresh store.
    pub async fn read_from_file(&self) -> Result<()> {
        if let Some(loaded) = read_json_optional::<StoreState>(&self.path)? {
            *self.state.write().await = loaded;
            debug!(path = %self.path.display(), "Loaded message store");
        }
        Ok(())
    }

    /// Persists the current state atomically.
    pub async fn write_to_file(&self) -> Result<()> {
        let state = self.state.read().await;
        atomic_write_json(&self.path, &*state)?;
        debug!(path = %self.path.display(), "Persisted message store");
        Ok(())
    }
}
