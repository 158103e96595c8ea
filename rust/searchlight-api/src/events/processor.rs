//! Background functions invoked by the event processor.
//!
//! The processor calls back with the event it received. Each event name
//! maps to one function made of named steps; every step is timed and its
//! output recorded in the returned [`FunctionReport`].

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Value, json};

use super::{EventEnvelope, IMAGE_REQUESTED, SEARCH_REQUESTED};
use crate::domain::{SearchType, default_model};
use crate::results::ResultProvider;

/// Why an event could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessorError {
    #[error("no function handles event '{0}'")]
    UnknownEvent(String),
    #[error("event data is missing '{0}'")]
    MissingField(&'static str),
    #[error("step '{step}' failed: {reason}")]
    StepFailed { step: &'static str, reason: String },
}

/// Output of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: &'static str,
    pub output: Value,
    pub duration_ms: u128,
}

/// Output of one function run.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionReport {
    pub function: &'static str,
    pub event: String,
    pub steps: Vec<StepReport>,
    pub result: Value,
}

impl FunctionReport {
    fn new(function: &'static str, event: &str) -> Self {
        Self {
            function,
            event: event.to_string(),
            steps: Vec::new(),
            result: Value::Null,
        }
    }

    async fn step<F>(&mut self, name: &'static str, work: F) -> Result<Value, ProcessorError>
    where
        F: Future<Output = Result<Value, String>>,
    {
        let start = Instant::now();
        let output = work
            .await
            .map_err(|reason| ProcessorError::StepFailed { step: name, reason })?;
        let duration_ms = start.elapsed().as_millis();
        tracing::debug!(function = self.function, step = name, duration_ms, "Step completed");
        self.steps.push(StepReport {
            name,
            output: output.clone(),
            duration_ms,
        });
        Ok(output)
    }
}

/// Runs the functions registered for each lifecycle event.
#[derive(Debug, Clone)]
pub struct BackgroundProcessor {
    results: Arc<dyn ResultProvider>,
}

impl BackgroundProcessor {
    #[must_use]
    pub fn new(results: Arc<dyn ResultProvider>) -> Self {
        Self { results }
    }

    /// Names of the events this processor handles.
    #[must_use]
    pub fn handled_events() -> [&'static str; 2] {
        [SEARCH_REQUESTED, IMAGE_REQUESTED]
    }

    pub async fn handle(&self, event: &EventEnvelope) -> Result<FunctionReport, ProcessorError> {
        let report = match event.name.as_str() {
            SEARCH_REQUESTED => self.process_search(event).await,
            IMAGE_REQUESTED => self.process_image_search(event).await,
            other => Err(ProcessorError::UnknownEvent(other.to_string())),
        };
        match &report {
            Ok(r) => tracing::info!(function = r.function, steps = r.steps.len(), "Background function finished"),
            Err(e) => tracing::warn!(event = %event.name, error = %e, "Background function failed"),
        }
        report
    }

    /// "Process Search": web-search, ai-analysis, save-results, notify-user.
    async fn process_search(&self, event: &EventEnvelope) -> Result<FunctionReport, ProcessorError> {
        let query = required_str(&event.data, "query")?;
        let kind = event
            .data
            .get("type")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<SearchType>().ok())
            .unwrap_or_default();
        let user_id = event.data.get("userId").and_then(Value::as_str).unwrap_or("");

        let mut report = FunctionReport::new("Process Search", &event.name);

        let results = Arc::clone(&self.results);
        let web = report
            .step("web-search", async move {
                results
                    .fetch_results(&query, kind, default_model().name)
                    .await
                    .map(|r| json!({ "query": query, "results": r.web_results.len(), "analysis": r.ai_analysis }))
                    .map_err(|e| e.to_string())
            })
            .await?;

        report
            .step("ai-analysis", async {
                Ok(json!({ "analysis": "AI analysis completed", "confidence": web["analysis"]["confidence"] }))
            })
            .await?;
        report
            .step("save-results", async { Ok(json!({ "saved": true })) })
            .await?;
        report
            .step("notify-user", async { Ok(json!({ "notified": true, "userId": user_id })) })
            .await?;

        report.result = json!({ "success": true, "query": web["query"], "type": kind });
        Ok(report)
    }

    /// "Process Image Search": image-search.
    async fn process_image_search(
        &self,
        event: &EventEnvelope,
    ) -> Result<FunctionReport, ProcessorError> {
        let query = required_str(&event.data, "query")?;
        let mut report = FunctionReport::new("Process Image Search", &event.name);

        let results = Arc::clone(&self.results);
        let q = query.clone();
        let images = report
            .step("image-search", async move {
                results
                    .image_results(&q)
                    .await
                    .map(|images| json!({ "query": q, "images": images.len() }))
                    .map_err(|e| e.to_string())
            })
            .await?;

        report.result = json!({ "success": true, "query": query, "imageCount": images["images"] });
        Ok(report)
    }
}

fn required_str(data: &Value, field: &'static str) -> Result<String, ProcessorError> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ProcessorError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{image_requested, search_requested};
    use crate::results::MockResultProvider;

    fn processor() -> BackgroundProcessor {
        BackgroundProcessor::new(Arc::new(MockResultProvider))
    }

    #[tokio::test]
    async fn test_process_search_runs_four_steps() {
        let event = EventEnvelope::new(
            SEARCH_REQUESTED,
            search_requested("tides", SearchType::Research, "user_1"),
        );
        let report = processor().handle(&event).await.unwrap();

        assert_eq!(report.function, "Process Search");
        let names: Vec<_> = report.steps.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["web-search", "ai-analysis", "save-results", "notify-user"]);
        assert_eq!(report.steps[0].output["results"], 3);
        assert_eq!(report.result["type"], "research");
        assert_eq!(report.result["query"], "tides");
    }

    #[tokio::test]
    async fn test_process_image_search() {
        let event = EventEnvelope::new(IMAGE_REQUESTED, image_requested("cats", "user_1"));
        let report = processor().handle(&event).await.unwrap();

        assert_eq!(report.function, "Process Image Search");
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.result["imageCount"], 6);
    }

    #[tokio::test]
    async fn test_unknown_event_and_missing_query() {
        let unknown = EventEnvelope::new("billing/charged", json!({}));
        assert_eq!(
            processor().handle(&unknown).await.unwrap_err(),
            ProcessorError::UnknownEvent("billing/charged".into())
        );

        let missing = EventEnvelope::new(SEARCH_REQUESTED, json!({"type": "search"}));
        assert_eq!(
            processor().handle(&missing).await.unwrap_err(),
            ProcessorError::MissingField("query")
        );
    }
}
