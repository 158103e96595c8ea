//! Lifecycle notifications.
//!
//! Milestones of a search are announced to an external background
//! processor. Delivery is fire-and-forget: callers spawn [`spawn_notify`]
//! and drop the handle, so a slow or failing processor never delays a
//! search. Without a signing key the [`DisabledNotifier`] is used and every
//! notification is skipped.

pub mod http;
pub mod processor;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::EventsConfig;
use crate::domain::SearchType;

pub use http::HttpEventNotifier;
pub use processor::{BackgroundProcessor, FunctionReport, ProcessorError, StepReport};

/// A search was submitted.
pub const SEARCH_REQUESTED: &str = "search/requested";
/// An image search was opened.
pub const IMAGE_REQUESTED: &str = "image/requested";

/// Wire shape of an event sent to the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub name: String,
    pub data: Value,
}

impl EventEnvelope {
    /// Wrap `data`, stamping it with the send time. Non-object payloads are
    /// nested under `value`.
    #[must_use]
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        let timestamp = Value::String(chrono::Utc::now().to_rfc3339());
        let data = match data {
            Value::Object(mut map) => {
                map.insert("timestamp".to_string(), timestamp);
                Value::Object(map)
            }
            other => json!({ "value": other, "timestamp": timestamp }),
        };
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Payload of [`SEARCH_REQUESTED`].
#[must_use]
pub fn search_requested(query: &str, kind: SearchType, user_id: &str) -> Value {
    json!({ "query": query, "type": kind, "userId": user_id })
}

/// Payload of [`IMAGE_REQUESTED`].
#[must_use]
pub fn image_requested(query: &str, user_id: &str) -> Value {
    json!({ "query": query, "userId": user_id })
}

/// Result of one delivery attempt. Callers are free to ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    Skipped,
    Failed(String),
}

#[async_trait]
pub trait EventNotifier: Send + Sync + std::fmt::Debug {
    /// Deliver one event. Never returns an error.
    async fn notify(&self, name: &str, data: Value) -> NotificationOutcome;

    fn is_enabled(&self) -> bool;
}

/// Notifier used when no signing key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl EventNotifier for DisabledNotifier {
    async fn notify(&self, name: &str, _data: Value) -> NotificationOutcome {
        tracing::debug!(event = name, "Event processor not configured; skipping event");
        NotificationOutcome::Skipped
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Pick the notifier the configuration allows.
#[must_use]
pub fn notifier_from_config(config: &EventsConfig) -> Arc<dyn EventNotifier> {
    match config.signing_key.as_deref() {
        Some(key) => Arc::new(HttpEventNotifier::new(&config.url, key)),
        None => Arc::new(DisabledNotifier),
    }
}

/// Send in the background. The handle may be dropped.
pub fn spawn_notify(
    notifier: Arc<dyn EventNotifier>,
    name: &'static str,
    data: Value,
) -> tokio::task::JoinHandle<NotificationOutcome> {
    tokio::spawn(async move {
        let outcome = notifier.notify(name, data).await;
        if let NotificationOutcome::Failed(reason) = &outcome {
            tracing::warn!(event = name, reason = %reason, "Event notification failed");
        }
        outcome
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_stamps_objects() {
        let env = EventEnvelope::new(SEARCH_REQUESTED, search_requested("q", SearchType::Search, "u1"));
        assert_eq!(env.name, "search/requested");
        assert_eq!(env.data["query"], "q");
        assert_eq!(env.data["type"], "search");
        assert_eq!(env.data["userId"], "u1");
        assert!(env.data["timestamp"].is_string());
    }

    #[test]
    fn test_envelope_wraps_scalars() {
        let env = EventEnvelope::new("x", json!(5));
        assert_eq!(env.data["value"], 5);
        assert!(env.data["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_disabled_notifier_skips() {
        let outcome = spawn_notify(Arc::new(DisabledNotifier), IMAGE_REQUESTED, json!({}))
            .await
            .unwrap();
        assert_eq!(outcome, NotificationOutcome::Skipped);
    }

    #[test]
    fn test_notifier_from_config() {
        assert!(!notifier_from_config(&EventsConfig::default()).is_enabled());

        let config = EventsConfig {
            signing_key: Some("signkey".into()),
            ..EventsConfig::default()
        };
        assert!(notifier_from_config(&config).is_enabled());
    }
}
