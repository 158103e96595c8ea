//! Delivery of events to the background processor over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{EventEnvelope, EventNotifier, NotificationOutcome};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts [`EventEnvelope`]s, authenticated with the signing key.
#[derive(Clone)]
pub struct HttpEventNotifier {
    client: Client,
    url: String,
    signing_key: String,
}

impl std::fmt::Debug for HttpEventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEventNotifier")
            .field("url", &self.url)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

impl HttpEventNotifier {
    #[must_use]
    pub fn new(url: &str, signing_key: &str) -> Self {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            url: url.to_string(),
            signing_key: signing_key.to_string(),
        }
    }
}

#[async_trait]
impl EventNotifier for HttpEventNotifier {
    async fn notify(&self, name: &str, data: Value) -> NotificationOutcome {
        let envelope = EventEnvelope::new(name, data);
        let sent = self
            .client
            .post(&self.url)
            .bearer_auth(&self.signing_key)
            .json(&envelope)
            .send()
            .await;

        match sent {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(event = name, "Event sent");
                NotificationOutcome::Sent
            }
            Ok(response) => NotificationOutcome::Failed(format!(
                "event processor returned HTTP {}",
                response.status().as_u16()
            )),
            Err(e) => NotificationOutcome::Failed(e.to_string()),
        }
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unreachable_processor_is_failed_not_error() {
        let notifier = HttpEventNotifier::new("http://127.0.0.1:9/e", "key");
        let outcome = notifier.notify("search/requested", json!({"query": "q"})).await;
        assert!(matches!(outcome, NotificationOutcome::Failed(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let notifier = HttpEventNotifier::new("http://127.0.0.1:8288/e", "signkey-secret");
        assert!(!format!("{notifier:?}").contains("signkey-secret"));
    }
}
