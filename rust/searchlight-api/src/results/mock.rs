//! Fixed result sets.

use async_trait::async_trait;

use super::{ProviderError, ResultProvider};
use crate::domain::{AiAnalysis, ImageResult, SearchResults, SearchType, WebResult, default_model};

/// Source label of the placeholder used when a live fetch fails.
pub const FALLBACK_SOURCE: &str = "Mock Data";

const MOCK_SOURCE: &str = "Mock Search Engine";
const IMAGE_SOURCES: [&str; 3] = ["Unsplash", "Pexels", "Pixabay"];
const IMAGE_COUNT: u32 = 6;

/// Percent-encode a query for use inside a URL component.
#[must_use]
pub fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// The three canned web results.
#[must_use]
pub fn mock_web_results(query: &str) -> Vec<WebResult> {
    let encoded = encode_component(query);
    vec![
        WebResult {
            title: format!("Search results for: {query}"),
            url: format!("https://example.com/search?q={encoded}"),
            snippet: format!(
                "This is a search result for \"{query}\". The search engine found relevant \
                 information about this topic."
            ),
            source: MOCK_SOURCE.to_string(),
        },
        WebResult {
            title: format!("More information about {query}"),
            url: format!("https://wikipedia.org/wiki/{encoded}"),
            snippet: format!(
                "Additional information and resources related to \"{query}\". This could \
                 include articles, documentation, or other relevant content."
            ),
            source: MOCK_SOURCE.to_string(),
        },
        WebResult {
            title: format!("Recent discussions about {query}"),
            url: format!("https://reddit.com/search?q={encoded}"),
            snippet: format!(
                "Recent discussions and community content related to \"{query}\". This \
                 includes forum posts, social media mentions, and other user-generated content."
            ),
            source: MOCK_SOURCE.to_string(),
        },
    ]
}

/// Single placeholder result substituted for a failed live fetch.
#[must_use]
pub fn fallback_result(query: &str) -> WebResult {
    WebResult {
        title: format!("Results for \"{query}\""),
        url: format!("https://duckduckgo.com/?q={}", encode_component(query)),
        snippet: format!(
            "Live results for \"{query}\" are unavailable right now. Open the link to search \
             the web directly."
        ),
        source: FALLBACK_SOURCE.to_string(),
    }
}

/// Synthesized analysis. An empty `model` is labelled with the default model.
#[must_use]
pub fn mock_analysis(query: &str, kind: SearchType, model: &str) -> AiAnalysis {
    let model = if model.trim().is_empty() {
        default_model().name.to_string()
    } else {
        model.to_string()
    };

    AiAnalysis {
        summary: format!(
            "AI analysis of \"{query}\": Based on the search results, this topic appears to be \
             significant in current discussions. The analysis suggests multiple perspectives \
             and potential areas for further research."
        ),
        key_points: vec![
            format!("Primary focus: {query}"),
            "Multiple sources available".to_string(),
            "Recent developments noted".to_string(),
            "Potential for deeper research".to_string(),
            format!("Search type: {kind}"),
            format!("AI model used: {model}"),
        ],
        confidence: 0.85,
        model,
        kind,
        recommendations: vec![
            "Consider exploring related topics".to_string(),
            "Check for recent updates".to_string(),
            "Look into expert opinions".to_string(),
            "Review multiple sources".to_string(),
        ],
    }
}

/// Six placeholder images rotating through the stock photo sources.
#[must_use]
pub fn mock_images(query: &str) -> Vec<ImageResult> {
    let encoded = encode_component(query);
    (1..=IMAGE_COUNT)
        .zip(IMAGE_SOURCES.iter().cycle())
        .map(|(id, source)| ImageResult {
            id,
            url: format!("https://picsum.photos/400/300?random={id}&query={encoded}"),
            title: format!("{query} - Image {id}"),
            source: (*source).to_string(),
            width: 400,
            height: 300,
        })
        .collect()
}

/// Provider returning the canned results without touching the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockResultProvider;

#[async_trait]
impl ResultProvider for MockResultProvider {
    async fn fetch_results(
        &self,
        query: &str,
        mode: SearchType,
        model: &str,
    ) -> Result<SearchResults, ProviderError> {
        Ok(SearchResults {
            web_results: mock_web_results(query),
            ai_analysis: mock_analysis(query, mode, model),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_component() {
        assert_eq!(encode_component("rust lang"), "rust%20lang");
        assert_eq!(encode_component("a+b&c"), "a%2Bb%26c");
    }

    #[test]
    fn test_mock_web_results() {
        let results = mock_web_results("rust lang");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Search results for: rust lang");
        assert_eq!(results[1].url, "https://wikipedia.org/wiki/rust%20lang");
        assert!(results.iter().all(|r| r.source == "Mock Search Engine"));
    }

    #[test]
    fn test_mock_analysis_labels() {
        let analysis = mock_analysis("tides", SearchType::Research, "");
        assert_eq!(analysis.model, "Claude 3.5 Sonnet");
        assert!((analysis.confidence - 0.85).abs() < f64::EPSILON);
        assert!(analysis.key_points.contains(&"Search type: research".to_string()));
        assert!(analysis.key_points.contains(&"AI model used: Claude 3.5 Sonnet".to_string()));
        assert_eq!(analysis.recommendations.len(), 4);
    }

    #[test]
    fn test_fallback_source() {
        assert_eq!(fallback_result("x").source, FALLBACK_SOURCE);
    }

    #[test]
    fn test_mock_images_cycle_sources() {
        let images = mock_images("cats");
        assert_eq!(images.len(), 6);
        let sources: Vec<_> = images.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(
            sources,
            vec!["Unsplash", "Pexels", "Pixabay", "Unsplash", "Pexels", "Pixabay"]
        );
        assert_eq!(images[5].title, "cats - Image 6");
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let results = MockResultProvider
            .fetch_results("rust", SearchType::Search, "GPT-4o")
            .await
            .unwrap();
        assert_eq!(results.web_results.len(), 3);
        assert_eq!(results.ai_analysis.model, "GPT-4o");
    }
}
