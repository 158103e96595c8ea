//! Library records and their lifecycle.
//!
//! A [`SearchRecord`] is written twice during one submission: first as a
//! provisional row holding only the query and its metadata, then patched in
//! place with the retrieved results. Field names follow the `Library` table
//! of the managed datastore, so the serde renames here are the wire format.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of search the user asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Quick web search.
    #[default]
    Search,
    /// Deeper research query.
    Research,
}

impl SearchType {
    /// Wire representation of the type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Research => "research",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`SearchType`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown search type '{0}' (expected 'search' or 'research')")]
pub struct UnknownSearchType(pub String);

impl FromStr for SearchType {
    type Err = UnknownSearchType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(Self::Search),
            "research" => Ok(Self::Research),
            other => Err(UnknownSearchType(other.to_string())),
        }
    }
}

/// Stage a persisted record is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStage {
    /// Only the query and metadata are stored.
    Submitted,
    /// Results and model have been backfilled.
    Enriched,
}

/// A persisted row of the `Library` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRecord {
    /// Datastore-assigned identifier.
    pub id: i64,
    /// The query as the user typed it.
    pub search_input: String,
    /// Owner of the record.
    pub user_email: String,
    /// Search or research.
    #[serde(rename = "type")]
    pub kind: SearchType,
    /// Client-generated submission identifier.
    #[serde(default)]
    pub search_id: Option<Uuid>,
    /// Label of the model the results were produced with.
    #[serde(default)]
    pub ai_model: Option<String>,
    /// Opaque serialized results blob.
    #[serde(default)]
    pub search_results: Option<serde_json::Value>,
    /// Assigned by the datastore on insert.
    #[serde(rename = "created_at", alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl SearchRecord {
    /// Which half of the double write this row reflects.
    #[must_use]
    pub fn stage(&self) -> RecordStage {
        if self.search_results.is_some() {
            RecordStage::Enriched
        } else {
            RecordStage::Submitted
        }
    }
}

/// Validation failures for new records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// The query is empty after trimming.
    #[error("search input must not be empty")]
    EmptyInput,
    /// No owner email was supplied.
    #[error("user email must not be empty")]
    MissingEmail,
}

/// Insert payload for the `Library` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSearchRecord {
    pub search_input: String,
    pub user_email: String,
    #[serde(rename = "type")]
    pub kind: SearchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<serde_json::Value>,
}

impl NewSearchRecord {
    /// Build the provisional row written before results are known.
    pub fn provisional(
        search_input: impl Into<String>,
        user_email: impl Into<String>,
        kind: SearchType,
        search_id: Uuid,
    ) -> Result<Self, RecordError> {
        let record = Self {
            search_input: search_input.into(),
            user_email: user_email.into(),
            kind,
            search_id: Some(search_id),
            ai_model: None,
            search_results: None,
        };
        record.validate()?;
        Ok(record)
    }

    /// Attach results, turning a provisional payload into an enriched one.
    #[must_use]
    pub fn with_results(mut self, ai_model: impl Into<String>, results: serde_json::Value) -> Self {
        self.ai_model = Some(ai_model.into());
        self.search_results = Some(results);
        self
    }

    /// Check the creation-time invariants.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.search_input.trim().is_empty() {
            return Err(RecordError::EmptyInput);
        }
        if self.user_email.trim().is_empty() {
            return Err(RecordError::MissingEmail);
        }
        Ok(())
    }
}

/// Partial update applied by the enriched write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
}

impl RecordPatch {
    /// Apply the patch to an existing record.
    pub fn apply_to(&self, record: &mut SearchRecord) {
        if let Some(results) = &self.search_results {
            record.search_results = Some(results.clone());
        }
        if let Some(model) = &self.ai_model {
            record.ai_model = Some(model.clone());
        }
    }
}

/// Equality filter for history queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFilter {
    /// Records owned by this email.
    pub user_email: String,
    /// Optional type restriction; `None` means all types.
    pub kind: Option<SearchType>,
}

impl LibraryFilter {
    /// All records of one user.
    pub fn for_user(user_email: impl Into<String>) -> Self {
        Self {
            user_email: user_email.into(),
            kind: None,
        }
    }

    /// Restrict to one type.
    #[must_use]
    pub fn with_kind(mut self, kind: Option<SearchType>) -> Self {
        self.kind = kind;
        self
    }

    /// Whether a record passes the filter.
    #[must_use]
    pub fn matches(&self, record: &SearchRecord) -> bool {
        record.user_email == self.user_email && self.kind.is_none_or(|kind| record.kind == kind)
    }
}

/// Display order of history queries, by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Most recent first.
    #[default]
    Newest,
    /// Oldest first.
    Oldest,
}

impl SortOrder {
    /// PostgREST `order` parameter value.
    #[must_use]
    pub fn as_postgrest(self) -> &'static str {
        match self {
            Self::Newest => "created_at.desc",
            Self::Oldest => "created_at.asc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" | "desc" => Ok(Self::Newest),
            "oldest" | "asc" => Ok(Self::Oldest),
            other => Err(format!("unknown sort order '{other}' (expected 'newest' or 'oldest')")),
        }
    }
}
