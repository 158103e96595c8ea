//! Read-only projections of a [`QuerySession`].
//!
//! Nothing here drives the lifecycle; a view is recomputed from the session
//! whenever it is shown.

pub mod export;

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{AiAnalysis, SearchType, WebResult};
use crate::runtime::{LifecycleState, QuerySession};

pub use export::{EXPORT_VERSION, ExportError, ExportFormat, SessionExport, export_session};

/// What the search page shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    Idle,
    Loading {
        query: String,
    },
    Error {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Results {
        query: String,
        #[serde(rename = "type")]
        kind: SearchType,
        model: &'static str,
        search_id: Option<Uuid>,
        web_results: Vec<WebResult>,
        ai_analysis: Option<AiAnalysis>,
    },
}

impl View {
    #[must_use]
    pub fn project(session: &QuerySession) -> Self {
        match &session.state {
            LifecycleState::Idle => Self::Idle,
            LifecycleState::Validating
            | LifecycleState::Persisting(_)
            | LifecycleState::Fetching => Self::Loading {
                query: session.submission().query,
            },
            LifecycleState::Errored(e) => Self::Error {
                message: session.error.clone().unwrap_or_else(|| e.to_string()),
            },
            LifecycleState::Rendered => {
                let submission = session.submission();
                Self::Results {
                    query: submission.query,
                    kind: submission.kind,
                    model: submission.model.name,
                    search_id: session.search_id,
                    web_results: session.web_results.clone(),
                    ai_analysis: session.ai_analysis.clone(),
                }
            }
        }
    }

    /// Plain-text rendering for the terminal client.
    #[must_use]
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Ask anything to get started.\n"),
            Self::Loading { query } => writeln!(f, "Searching for \"{query}\"..."),
            Self::Error { message } => writeln!(f, "Error: {message}"),
            Self::Results {
                query,
                kind,
                model,
                web_results,
                ai_analysis,
                ..
            } => {
                writeln!(f, "{query}")?;
                writeln!(f, "[{kind} | {model}]")?;
                writeln!(f)?;
                if let Some(analysis) = ai_analysis {
                    writeln!(f, "AI Analysis")?;
                    writeln!(f, "  {}", analysis.summary)?;
                    for point in &analysis.key_points {
                        writeln!(f, "  - {point}")?;
                    }
                    writeln!(f, "  Confidence: {:.0}%", analysis.confidence * 100.0)?;
                    writeln!(f)?;
                }
                writeln!(f, "Sources ({})", web_results.len())?;
                for (i, result) in web_results.iter().enumerate() {
                    writeln!(f, "  {}. {} ({})", i + 1, result.title, result.source)?;
                    writeln!(f, "     {}", result.url)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SearchResults;
    use crate::results::mock::{mock_analysis, mock_web_results};
    use crate::runtime::{LifecycleEvent, Precondition};

    fn rendered(query: &str) -> QuerySession {
        let mut session = QuerySession::new();
        session.query = query.to_string();
        for event in [
            LifecycleEvent::Submit,
            LifecycleEvent::Validated,
            LifecycleEvent::ProvisionalSettled,
        ] {
            session.apply(event).unwrap();
        }
        let results = SearchResults {
            web_results: mock_web_results(query),
            ai_analysis: mock_analysis(query, SearchType::Search, session.model.name),
        };
        session.web_results = results.web_results;
        session.ai_analysis = Some(results.ai_analysis);
        session.search_id = Some(Uuid::new_v4());
        session.apply(LifecycleEvent::ResultsArrived).unwrap();
        session.apply(LifecycleEvent::EnrichedSettled).unwrap();
        session
    }

    #[test]
    fn test_project_each_state() {
        let mut session = QuerySession::new();
        assert_eq!(View::project(&session), View::Idle);

        session.query = " tides ".into();
        session.apply(LifecycleEvent::Submit).unwrap();
        assert_eq!(
            View::project(&session),
            View::Loading {
                query: "tides".into()
            }
        );

        session
            .apply(LifecycleEvent::Rejected(Precondition::NoPrincipal))
            .unwrap();
        assert_eq!(
            View::project(&session),
            View::Error {
                message: "Please sign in to search".into()
            }
        );
    }

    #[test]
    fn test_results_view_and_text() {
        let session = rendered("rust");
        let view = View::project(&session);
        let View::Results { web_results, .. } = &view else {
            panic!("expected results view");
        };
        assert_eq!(web_results.len(), 3);

        let text = view.render_text();
        assert!(text.starts_with("rust\n"));
        assert!(text.contains("Sources (3)"));
        assert!(text.contains("Confidence: 85%"));
    }

    #[test]
    fn test_view_wire_shape() {
        let json = serde_json::to_value(View::project(&rendered("rust"))).unwrap();
        assert_eq!(json["view"], "results");
        assert_eq!(json["type"], "search");
        assert_eq!(json["webResults"].as_array().unwrap().len(), 3);
        assert!(json["aiAnalysis"]["keyPoints"].is_array());
    }
}
