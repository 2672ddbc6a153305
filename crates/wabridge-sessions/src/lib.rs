//! Session lifecycle management and event routing.
//!
//! The [`SessionRegistry`] is the process-wide source of truth for live
//! protocol sessions: it creates them (QR or pairing-code hand-off),
//! keeps them alive across network failures per the [`ReconnectPolicy`],
//! routes their protocol events to the message store, command
//! interpreter, and webhook dispatcher, and tears them down without
//! leaving orphaned listeners or on-disk state behind.

pub mod config;
pub mod error;
pub mod reconnect;
pub mod registry;
mod router;

pub use config::GatewayConfig;
pub use error::{Result, SessionError};
pub use reconnect::{ReconnectDecision, ReconnectPolicy, UNLIMITED_RETRIES};
pub use registry::{AuthHandoff, AuthOptions, AuthOutcome, SessionHandle, SessionRegistry};
