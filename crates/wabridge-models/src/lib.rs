//! Core data models for Wabridge.
//!
//! This crate provides the fundamental data types used throughout the
//! Wabridge system: session identifiers, the protocol message envelope,
//! the typed protocol event enumeration, and JID helpers.

pub mod event;
pub mod ids;
pub mod jid;
pub mod message;
pub mod poll;

// Re-export main types
pub use event::{
    BatchKind, ConnectionState, ConnectionUpdate, DisconnectReason, MessageUpdate, MutationKind,
    ProtocolEvent, ReceiptContent, ReceiptUpdate, WebhookEvent,
};
pub use ids::SessionId;
pub use message::{
    ContextInfo, ExtendedText, MediaContent, MessageContent, MessageEnvelope, MessageKey,
    MessageStatus,
};
pub use poll::{aggregate_poll_votes, PollContent, PollOption, PollTally, PollUpdate};
