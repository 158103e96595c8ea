//! Per-view query session.

use serde::Serialize;
use uuid::Uuid;

use super::lifecycle::{InvalidTransition, LifecycleEvent, LifecycleState, transition};
use crate::domain::{AiAnalysis, ModelRef, SearchType, WebResult, default_model};

/// What a submission searched for, frozen when it passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub query: String,
    #[serde(rename = "type")]
    pub kind: SearchType,
    pub model: ModelRef,
}

/// Everything one view of the search page holds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySession {
    /// Input buffer.
    pub query: String,
    #[serde(rename = "type")]
    pub kind: SearchType,
    pub model: ModelRef,
    pub state: LifecycleState,
    /// States of the current submission, oldest first.
    pub trace: Vec<LifecycleState>,
    pub search_id: Option<Uuid>,
    /// Set once the running submission is validated. Later input edits do
    /// not change it.
    pub submitted: Option<Submission>,
    pub web_results: Vec<WebResult>,
    pub ai_analysis: Option<AiAnalysis>,
    pub error: Option<String>,
}

impl Default for QuerySession {
    fn default() -> Self {
        Self {
            query: String::new(),
            kind: SearchType::default(),
            model: default_model(),
            state: LifecycleState::Idle,
            trace: vec![LifecycleState::Idle],
            search_id: None,
            submitted: None,
            web_results: Vec::new(),
            ai_analysis: None,
            error: None,
        }
    }
}

impl QuerySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.state.is_busy()
    }

    /// Clear the previous submission's output and return to `Idle`.
    pub fn reset(&mut self) -> Result<(), InvalidTransition> {
        if self.state != LifecycleState::Idle {
            self.state = transition(&self.state, LifecycleEvent::Reset)?;
        }
        self.trace = vec![LifecycleState::Idle];
        self.search_id = None;
        self.submitted = None;
        self.web_results.clear();
        self.ai_analysis = None;
        self.error = None;
        Ok(())
    }

    /// Return a session left busy by a submission that was dropped before it
    /// finished. Only call this while holding the in-flight guard.
    pub fn reclaim(&mut self) {
        if self.state.is_busy() {
            tracing::warn!(state = %self.state, "Reclaiming session from a dropped submission");
            self.state = LifecycleState::Idle;
        }
    }

    /// The submitted query, kind and model, or the current input when nothing
    /// has been submitted.
    #[must_use]
    pub fn submission(&self) -> Submission {
        self.submitted.clone().unwrap_or_else(|| Submission {
            query: self.query.trim().to_string(),
            kind: self.kind,
            model: self.model,
        })
    }

    /// Feed one event through the state machine and record the new state.
    pub fn apply(&mut self, event: LifecycleEvent) -> Result<&LifecycleState, InvalidTransition> {
        let next = transition(&self.state, event)?;
        if let LifecycleState::Errored(e) = &next {
            self.error = Some(e.to_string());
        }
        self.trace.push(next.clone());
        self.state = next;
        Ok(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::lifecycle::Precondition;

    #[test]
    fn test_new_session_defaults() {
        let session = QuerySession::new();
        assert_eq!(session.model.name, "Claude 3.5 Sonnet");
        assert_eq!(session.kind, SearchType::Search);
        assert_eq!(session.trace, vec![LifecycleState::Idle]);
        assert!(!session.loading());
    }

    #[test]
    fn test_apply_records_trace_and_error() {
        let mut session = QuerySession::new();
        session.apply(LifecycleEvent::Submit).unwrap();
        assert!(session.loading());
        session
            .apply(LifecycleEvent::Rejected(Precondition::EmptyInput))
            .unwrap();
        assert_eq!(session.trace.len(), 3);
        assert_eq!(session.error.as_deref(), Some("Please enter a search query"));

        session.reset().unwrap();
        assert_eq!(session.state, LifecycleState::Idle);
        assert!(session.error.is_none());
        assert_eq!(session.trace.len(), 1);
    }

    #[test]
    fn test_reset_refused_mid_submission() {
        let mut session = QuerySession::new();
        session.apply(LifecycleEvent::Submit).unwrap();
        assert!(session.reset().is_err());
    }

    #[test]
    fn test_reclaim_busy_session() {
        let mut session = QuerySession::new();
        session.apply(LifecycleEvent::Submit).unwrap();
        session.apply(LifecycleEvent::Validated).unwrap();
        session.reclaim();
        assert_eq!(session.state, LifecycleState::Idle);
        session.reset().unwrap();
        session.apply(LifecycleEvent::Submit).unwrap();
        assert_eq!(session.state, LifecycleState::Validating);

        // Terminal states are left for `reset`.
        session
            .apply(LifecycleEvent::Rejected(Precondition::EmptyInput))
            .unwrap();
        session.reclaim();
        assert!(session.state.is_terminal());
    }

    #[test]
    fn test_submission_falls_back_to_input() {
        let mut session = QuerySession::new();
        session.query = "  tides ".into();
        assert_eq!(session.submission().query, "tides");

        session.submitted = Some(session.submission());
        session.query = "edited".into();
        session.kind = SearchType::Research;
        let submission = session.submission();
        assert_eq!(submission.query, "tides");
        assert_eq!(submission.kind, SearchType::Search);
    }
}
