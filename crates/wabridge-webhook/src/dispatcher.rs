//! Fire-and-forget webhook delivery.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use wabridge_models::{SessionId, WebhookEvent};

use crate::filter::EventFilter;

/// Timeout for a single webhook POST.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Body posted to the webhook destination.
#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    instance: &'a str,
    #[serde(rename = "type")]
    event_type: &'static str,
    data: Value,
}

/// Forwards allow-listed events to the configured destination URL.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: Option<Url>,
    filter: EventFilter,
}

impl WebhookDispatcher {
    pub fn new(url: Option<Url>, filter: EventFilter) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url,
            filter,
        }
    }

    /// A dispatcher that never delivers (no destination configured).
    pub fn disabled() -> Self {
        Self::new(None, EventFilter::default())
    }

    /// Posts `{instance, type, data}` to the destination if the event
    /// type is allow-listed.
    ///
    /// Delivery runs on a spawned task; failures are logged and
    /// swallowed. The returned handle is only useful to tests that want
    /// to await completion.
    pub fn dispatch(
        &self,
        session_id: &SessionId,
        event: WebhookEvent,
        data: Value,
    ) -> Option<JoinHandle<()>> {
        if !self.filter.allows(event) {
            return None;
        }
        let url = self.url.clone()?;

        let client = self.client.clone();
        let instance = session_id.to_string();
        Some(tokio::spawn(async move {
            let body = WebhookBody {
                instance: &instance,
                event_type: event.as_str(),
                data,
            };
            match client.post(url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(instance = %instance, event = %event, "Webhook delivered");
                }
                Ok(response) => {
                    warn!(
                        instance = %instance,
                        event = %event,
                        status = %response.status(),
                        "Webhook destination rejected event"
                    );
                }
                Err(e) => {
                    warn!(instance = %instance, event = %event, error = %e, "Webhook delivery failed");
                }
            }
        }))
    }
}
