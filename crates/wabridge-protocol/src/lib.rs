//! Chat-protocol client seam.
//!
//! The protocol implementation (pairing cryptography, message framing,
//! media encryption) is an external collaborator. This crate defines the
//! traits the session layer consumes: a [`ProtocolConnector`] that opens
//! one transport per session and a [`ProtocolClient`] handle for outbound
//! operations, with events delivered over an ordered channel.
//!
//! Enable the `testing` feature for a scripted in-memory implementation
//! used by integration tests.

pub mod client;
pub mod error;

#[cfg(feature = "testing")]
pub mod testing;

pub use client::{
    ConnectOptions, Connection, OutgoingContent, ProtocolClient, ProtocolConnector, SendOptions,
};
pub use error::{ProtocolError, Result};
