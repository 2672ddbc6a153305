//! Outbound webhook dispatch.
//!
//! Protocol events that pass the configured allow-list are forwarded to a
//! single destination URL as `{instance, type, data}`. Delivery is
//! best-effort: failures are logged and swallowed so webhook trouble can
//! never stall protocol event processing.

pub mod dispatcher;
pub mod filter;

pub use dispatcher::WebhookDispatcher;
pub use filter::EventFilter;
