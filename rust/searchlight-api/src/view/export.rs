//! Export of a rendered search as Markdown or JSON.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{AiAnalysis, SearchType, WebResult};
use crate::runtime::{LifecycleState, QuerySession};

/// Export format version.
pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown export format '{other}' (expected md or json)")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export: the session is {0}, not Rendered")]
    NotRendered(String),
    #[error("failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// JSON export document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub version: &'static str,
    pub exported_at: String,
    pub query: String,
    #[serde(rename = "type")]
    pub kind: SearchType,
    pub model: &'static str,
    pub search_id: Option<Uuid>,
    pub web_results: Vec<WebResult>,
    pub ai_analysis: Option<AiAnalysis>,
}

impl SessionExport {
    fn from_session(session: &QuerySession) -> Self {
        let submission = session.submission();
        Self {
            version: EXPORT_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            query: submission.query,
            kind: submission.kind,
            model: submission.model.name,
            search_id: session.search_id,
            web_results: session.web_results.clone(),
            ai_analysis: session.ai_analysis.clone(),
        }
    }
}

/// Export a rendered session. Any other state is refused.
pub fn export_session(session: &QuerySession, format: ExportFormat) -> Result<String, ExportError> {
    if session.state != LifecycleState::Rendered {
        return Err(ExportError::NotRendered(session.state.to_string()));
    }
    let export = SessionExport::from_session(session);
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&export)?),
        ExportFormat::Markdown => Ok(to_markdown(&export)),
    }
}

fn to_markdown(export: &SessionExport) -> String {
    let mut md = String::new();

    let _ = writeln!(md, "# {}\n", export.query);
    md.push_str("## Search Information\n\n");
    let _ = writeln!(md, "- **Type**: {}", export.kind);
    let _ = writeln!(md, "- **Model**: {}", export.model);
    if let Some(id) = export.search_id {
        let _ = writeln!(md, "- **Search ID**: `{id}`");
    }
    let _ = writeln!(md, "- **Exported**: {}\n", export.exported_at);

    if let Some(analysis) = &export.ai_analysis {
        md.push_str("## AI Analysis\n\n");
        let _ = writeln!(md, "{}\n", analysis.summary);
        if !analysis.key_points.is_empty() {
            md.push_str("### Key Points\n\n");
            for point in &analysis.key_points {
                let _ = writeln!(md, "- {point}");
            }
            md.push('\n');
        }
        if !analysis.recommendations.is_empty() {
            md.push_str("### Recommendations\n\n");
            for rec in &analysis.recommendations {
                let _ = writeln!(md, "- {rec}");
            }
            md.push('\n');
        }
        let _ = writeln!(md, "**Confidence**: {:.0}%\n", analysis.confidence * 100.0);
    }

    md.push_str("## Sources\n\n");
    for (i, result) in export.web_results.iter().enumerate() {
        let _ = writeln!(md, "{}. [{}]({}) - {}", i + 1, result.title, result.url, result.source);
        let _ = writeln!(md, "   {}", result.snippet);
    }

    md.push_str("\n---\n\n");
    let _ = writeln!(md, "*Export version {EXPORT_VERSION}*");
    md
}
