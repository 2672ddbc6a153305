//! Credential and message persistence for Wabridge sessions.
//!
//! Two stores live here. The [`CredentialStore`] keeps a session's
//! authentication material between restarts; its file-system
//! implementation also anchors crash recovery (a session id present on
//! disk is a session worth resuming). The [`MessageStore`] is a bounded
//! in-memory index of recent messages per conversation, used to resolve
//! update events that arrive without a message body.

pub mod atomic;
pub mod credentials;
pub mod error;
pub mod messages;

pub use credentials::{CredentialStore, FsCredentialStore};
pub use error::{Result, StoreError};
pub use messages::MessageStore;
