//! Discover page data.

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/discover", get(discover))
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrendingTopic {
    pub id: u32,
    pub title: &'static str,
    pub category: &'static str,
    pub searches: u32,
    pub trend: &'static str,
}

const fn topic(id: u32, title: &'static str, category: &'static str, searches: u32) -> TrendingTopic {
    TrendingTopic {
        id,
        title,
        category,
        searches,
        trend: "up",
    }
}

pub const TRENDING: [TrendingTopic; 6] = [
    topic(1, "Artificial Intelligence", "Technology", 15420),
    topic(2, "Climate Change", "Environment", 12850),
    topic(3, "Space Exploration", "Science", 9870),
    topic(4, "Quantum Computing", "Technology", 7650),
    topic(5, "Renewable Energy", "Environment", 6540),
    topic(6, "Machine Learning", "Technology", 5430),
];

/// Quick-search prompts.
pub const SUGGESTIONS: [&str; 6] = [
    "Latest AI developments",
    "Climate change solutions",
    "Space missions 2024",
    "Quantum computing breakthroughs",
    "Renewable energy trends",
    "Machine learning applications",
];

#[derive(Debug, Serialize)]
struct DiscoverResponse {
    trending: &'static [TrendingTopic],
    suggestions: &'static [&'static str],
}

async fn discover() -> Json<DiscoverResponse> {
    Json(DiscoverResponse {
        trending: &TRENDING,
        suggestions: &SUGGESTIONS,
    })
}
