//! Event allow-list.

use std::collections::HashSet;

use wabridge_models::WebhookEvent;

/// Wildcard marker allowing every event type.
const WILDCARD: &str = "ALL";

/// Allow-list of webhook event types.
///
/// Parsed from a comma-separated configuration value; the `ALL` marker
/// allows everything, an empty value allows nothing.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    all: bool,
    allowed: HashSet<String>,
}

impl EventFilter {
    /// Parses a comma-separated allow-list.
    pub fn parse(raw: &str) -> Self {
        let mut all = false;
        let mut allowed = HashSet::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            if entry == WILDCARD {
                all = true;
            } else {
                allowed.insert(entry.to_string());
            }
        }
        Self { all, allowed }
    }

    /// An allow-everything filter.
    pub fn allow_all() -> Self {
        Self {
            all: true,
            allowed: HashSet::new(),
        }
    }

    /// Returns true if the event type passes the filter.
    pub fn allows(&self, event: WebhookEvent) -> bool {
        self.all || self.allowed.contains(event.as_str())
    }
}
