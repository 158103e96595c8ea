//! Query lifecycle state machine.
//!
//! A submission walks
//! `Idle → Validating → Persisting(Provisional) → Fetching →
//! Persisting(Enriched) → Rendered`, or ends in `Errored` when validation
//! or the result provider fails. All moves go through [`transition`].
//! Persistence write failures are recorded by the controller but never
//! produce an event here, so a failed write cannot stop a submission.

use std::fmt;

use serde::{Serialize, Serializer};

/// Which of the two writes of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStage {
    Provisional,
    Enriched,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisional => f.write_str("Provisional"),
            Self::Enriched => f.write_str("Enriched"),
        }
    }
}

/// Unmet submission precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    /// Nobody is signed in.
    NoPrincipal,
    /// The query is empty after trimming.
    EmptyInput,
}

/// User-visible failure of a submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("{}", match .0 {
        Precondition::NoPrincipal => "Please sign in to search",
        Precondition::EmptyInput => "Please enter a search query",
    })]
    PreconditionFailed(Precondition),
    #[error("Failed to perform search. Please try again. ({0})")]
    ProviderUnavailable(String),
}

impl LifecycleError {
    /// Short kind name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PreconditionFailed(_) => "PreconditionFailed",
            Self::ProviderUnavailable(_) => "ProviderUnavailable",
        }
    }

    /// Whether resubmitting may help.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }
}

/// A write that did not go through. Logged and reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{stage} write failed: {reason}")]
pub struct PersistenceWriteFailed {
    pub stage: WriteStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Validating,
    Persisting(WriteStage),
    Fetching,
    Rendered,
    Errored(LifecycleError),
}

impl LifecycleState {
    /// End of a submission.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rendered | Self::Errored(_))
    }

    /// A submission is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Validating | Self::Persisting(_) | Self::Fetching)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Validating => f.write_str("Validating"),
            Self::Persisting(stage) => write!(f, "Persisting({stage})"),
            Self::Fetching => f.write_str("Fetching"),
            Self::Rendered => f.write_str("Rendered"),
            Self::Errored(e) => write!(f, "Errored({})", e.kind()),
        }
    }
}

impl Serialize for LifecycleState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Start over after a finished submission.
    Reset,
    Submit,
    Rejected(Precondition),
    Validated,
    /// The provisional insert resolved, successfully or not.
    ProvisionalSettled,
    ResultsArrived,
    ProviderFailed(String),
    /// The enriched write resolved, successfully or not.
    EnrichedSettled,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => f.write_str("Reset"),
            Self::Submit => f.write_str("Submit"),
            Self::Rejected(p) => write!(f, "Rejected({p:?})"),
            Self::Validated => f.write_str("Validated"),
            Self::ProvisionalSettled => f.write_str("ProvisionalSettled"),
            Self::ResultsArrived => f.write_str("ResultsArrived"),
            Self::ProviderFailed(_) => f.write_str("ProviderFailed"),
            Self::EnrichedSettled => f.write_str("EnrichedSettled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event {event} is not valid in state {state}")]
pub struct InvalidTransition {
    pub state: LifecycleState,
    pub event: LifecycleEvent,
}

/// The next state, or an error when `event` makes no sense in `state`.
pub fn transition(
    state: &LifecycleState,
    event: LifecycleEvent,
) -> Result<LifecycleState, InvalidTransition> {
    use LifecycleEvent as E;
    use LifecycleState as S;

    let next = match (state, &event) {
        (S::Idle | S::Rendered | S::Errored(_), E::Reset) => S::Idle,
        (S::Idle, E::Submit) => S::Validating,
        (S::Validating, E::Rejected(p)) => S::Errored(LifecycleError::PreconditionFailed(*p)),
        (S::Validating, E::Validated) => S::Persisting(WriteStage::Provisional),
        (S::Persisting(WriteStage::Provisional), E::ProvisionalSettled) => S::Fetching,
        (S::Fetching, E::ResultsArrived) => S::Persisting(WriteStage::Enriched),
        (S::Fetching, E::ProviderFailed(reason)) => {
            S::Errored(LifecycleError::ProviderUnavailable(reason.clone()))
        }
        (S::Persisting(WriteStage::Enriched), E::EnrichedSettled) => S::Rendered,
        _ => {
            return Err(InvalidTransition {
                state: state.clone(),
                event,
            });
        }
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: Vec<LifecycleEvent>) -> Result<Vec<LifecycleState>, InvalidTransition> {
        let mut state = LifecycleState::Idle;
        let mut trace = vec![state.clone()];
        for event in events {
            state = transition(&state, event)?;
            trace.push(state.clone());
        }
        Ok(trace)
    }

    #[test]
    fn test_happy_path() {
        let trace = run(vec![
            LifecycleEvent::Submit,
            LifecycleEvent::Validated,
            LifecycleEvent::ProvisionalSettled,
            LifecycleEvent::ResultsArrived,
            LifecycleEvent::EnrichedSettled,
        ])
        .unwrap();
        let labels: Vec<String> = trace.iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            vec![
                "Idle",
                "Validating",
                "Persisting(Provisional)",
                "Fetching",
                "Persisting(Enriched)",
                "Rendered"
            ]
        );
    }

    #[test]
    fn test_rejection_and_provider_failure() {
        let trace = run(vec![
            LifecycleEvent::Submit,
            LifecycleEvent::Rejected(Precondition::EmptyInput),
        ])
        .unwrap();
        assert_eq!(
            trace.last(),
            Some(&LifecycleState::Errored(LifecycleError::PreconditionFailed(
                Precondition::EmptyInput
            )))
        );

        let trace = run(vec![
            LifecycleEvent::Submit,
            LifecycleEvent::Validated,
            LifecycleEvent::ProvisionalSettled,
            LifecycleEvent::ProviderFailed("down".into()),
        ])
        .unwrap();
        let last = trace.last().unwrap();
        assert!(last.is_terminal());
        assert_eq!(last.to_string(), "Errored(ProviderUnavailable)");
    }

    #[test]
    fn test_terminal_states_restart_through_reset() {
        let rendered = LifecycleState::Rendered;
        assert!(transition(&rendered, LifecycleEvent::Submit).is_err());
        let idle = transition(&rendered, LifecycleEvent::Reset).unwrap();
        assert_eq!(transition(&idle, LifecycleEvent::Submit).unwrap(), LifecycleState::Validating);
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(transition(&LifecycleState::Idle, LifecycleEvent::ResultsArrived).is_err());
        assert!(transition(&LifecycleState::Fetching, LifecycleEvent::Reset).is_err());
        let err = transition(
            &LifecycleState::Persisting(WriteStage::Provisional),
            LifecycleEvent::EnrichedSettled,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "event EnrichedSettled is not valid in state Persisting(Provisional)"
        );
    }

    #[test]
    fn test_error_messages() {
        let err = LifecycleError::PreconditionFailed(Precondition::NoPrincipal);
        assert_eq!(err.to_string(), "Please sign in to search");
        assert!(!err.is_retryable());
        assert!(LifecycleError::ProviderUnavailable("x".into()).is_retryable());
    }
}
