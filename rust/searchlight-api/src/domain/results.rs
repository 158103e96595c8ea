//! Result payloads returned by result providers.

use serde::{Deserialize, Serialize};

use super::search::SearchType;

/// One reference snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: String,
}

/// Synthesized summary of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub summary: String,
    pub key_points: Vec<String>,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub model: String,
    #[serde(rename = "type")]
    pub kind: SearchType,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// What the enriched write stores in `searchResults`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub web_results: Vec<WebResult>,
    pub ai_analysis: AiAnalysis,
}

impl SearchResults {
    /// Serialize into the opaque blob stored on the record.
    pub fn to_blob(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Decode a stored blob. Rows written by older clients may not match.
    pub fn from_blob(blob: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(blob.clone()).ok()
    }
}

/// One image search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub id: u32,
    pub url: String,
    pub title: String,
    pub source: String,
    pub width: u32,
    pub height: u32,
}
