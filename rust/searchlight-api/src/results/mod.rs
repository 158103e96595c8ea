//! Web and AI result providers.
//!
//! A provider turns a query into reference snippets plus an analysis. The
//! analysis is always synthesized locally. Web results come either from a
//! fixed mock set ([`MockResultProvider`]) or from one best-effort scrape of
//! an HTML search page ([`WebResultProvider`]), which never fails and falls
//! back to a single placeholder result instead.

pub mod mock;
pub mod web;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ResultsConfig, ResultsMode};
use crate::domain::{ImageResult, SearchResults, SearchType};

pub use mock::MockResultProvider;
pub use web::WebResultProvider;

/// Why a provider could not produce results.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("result provider unavailable: {0}")]
    Unavailable(String),
    #[error("search endpoint returned HTTP {0}")]
    Status(u16),
    #[error("result provider timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait ResultProvider: Send + Sync + std::fmt::Debug {
    /// Results for `query` in the given mode, labelled with `model`.
    async fn fetch_results(
        &self,
        query: &str,
        mode: SearchType,
        model: &str,
    ) -> Result<SearchResults, ProviderError>;

    /// Image hits for `query`.
    async fn image_results(&self, query: &str) -> Result<Vec<ImageResult>, ProviderError> {
        Ok(mock::mock_images(query))
    }

    fn name(&self) -> &'static str;
}

/// Build the provider selected by `results.mode`.
pub fn provider_from_config(config: &ResultsConfig) -> anyhow::Result<Arc<dyn ResultProvider>> {
    Ok(match config.mode {
        ResultsMode::Mock => Arc::new(MockResultProvider),
        ResultsMode::Live => Arc::new(WebResultProvider::new(
            &config.endpoint,
            Duration::from_secs(config.timeout_secs),
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_config() {
        let mock = provider_from_config(&ResultsConfig::default()).unwrap();
        assert_eq!(mock.name(), "mock");

        let live = provider_from_config(&ResultsConfig {
            mode: ResultsMode::Live,
            ..ResultsConfig::default()
        })
        .unwrap();
        assert_eq!(live.name(), "web");
    }
}
