//! Best-effort scrape of an HTML search results page.
//!
//! The default endpoint is DuckDuckGo's HTML frontend. Result links are
//! `<a class="result__a">` anchors whose `href` is usually a redirect
//! carrying the target in a `uddg` query parameter; snippets sit in
//! `result__snippet` elements in the same order.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use url::Url;

use super::mock::{fallback_result, mock_analysis};
use super::{ProviderError, ResultProvider};
use crate::domain::{SearchResults, SearchType, WebResult};

const MAX_RESULTS: usize = 8;
const USER_AGENT: &str = concat!("searchlight/", env!("CARGO_PKG_VERSION"));

/// Extracts [`WebResult`]s from a results page.
#[derive(Debug, Clone)]
pub struct ResultParser {
    anchor: Regex,
    href: Regex,
    snippet: Regex,
    tag: Regex,
    whitespace: Regex,
}

impl ResultParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            anchor: Regex::new(r#"(?is)<a\s([^>]*class="[^"]*\bresult__a\b[^"]*"[^>]*)>(.*?)</a>"#)?,
            href: Regex::new(r#"(?i)href\s*=\s*"([^"]*)""#)?,
            snippet: Regex::new(
                r#"(?is)<(a|div|td)\s[^>]*class="[^"]*\bresult__snippet\b[^"]*"[^>]*>(.*?)</(?:a|div|td)>"#,
            )?,
            tag: Regex::new(r"<[^>]+>")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Parse up to `limit` results. Anchors without a usable link are skipped.
    #[must_use]
    pub fn parse(&self, html: &str, limit: usize) -> Vec<WebResult> {
        let snippets: Vec<String> = self
            .snippet
            .captures_iter(html)
            .map(|c| self.text(&c[2]))
            .collect();

        self.anchor
            .captures_iter(html)
            .enumerate()
            .filter_map(|(i, caps)| {
                let raw_href = self.href.captures(&caps[1])?.get(1)?.as_str();
                let target = resolve_link(&decode_entities(raw_href))?;
                let title = self.text(&caps[2]);
                if title.is_empty() {
                    return None;
                }
                Some(WebResult {
                    title,
                    source: source_label(&target),
                    url: target.into(),
                    snippet: snippets.get(i).cloned().unwrap_or_default(),
                })
            })
            .take(limit)
            .collect()
    }

    fn text(&self, fragment: &str) -> String {
        let stripped = self.tag.replace_all(fragment, "");
        let decoded = decode_entities(&stripped);
        self.whitespace.replace_all(decoded.trim(), " ").into_owned()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Absolute target of a result link, unwrapping redirect links.
fn resolve_link(href: &str) -> Option<Url> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;

    let redirected = url
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .and_then(|(_, target)| Url::parse(&target).ok());

    let target = redirected.unwrap_or(url);
    matches!(target.scheme(), "http" | "https").then_some(target)
}

fn source_label(url: &Url) -> String {
    url.host_str()
        .map(|host| host.trim_start_matches("www.").to_string())
        .unwrap_or_else(|| "web".to_string())
}

/// Scrapes one results page per query and never returns an error: any
/// failure, timeout or empty page yields the single fallback result.
#[derive(Debug, Clone)]
pub struct WebResultProvider {
    client: Client,
    endpoint: String,
    timeout: Duration,
    parser: ResultParser,
}

impl WebResultProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, regex::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            timeout,
            parser: ResultParser::new()?,
        })
    }

    async fn scrape(&self, query: &str) -> Result<Vec<WebResult>, ProviderError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        Ok(self.parser.parse(&html, MAX_RESULTS))
    }

    /// Live results or the fallback.
    pub async fn web_results(&self, query: &str) -> Vec<WebResult> {
        let outcome = match tokio::time::timeout(self.timeout, self.scrape(query)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(results) if !results.is_empty() => {
                tracing::debug!(query, count = results.len(), "Parsed live results");
                results
            }
            Ok(_) => {
                tracing::warn!(query, "Live search returned no parsable results; using fallback");
                vec![fallback_result(query)]
            }
            Err(e) => {
                tracing::warn!(query, error = %e, "Live search failed; using fallback");
                vec![fallback_result(query)]
            }
        }
    }
}

#[async_trait]
impl ResultProvider for WebResultProvider {
    async fn fetch_results(
        &self,
        query: &str,
        mode: SearchType,
        model: &str,
    ) -> Result<SearchResults, ProviderError> {
        Ok(SearchResults {
            web_results: self.web_results(query).await,
            ai_analysis: mock_analysis(query, mode, model),
        })
    }

    fn name(&self) -> &'static str {
        "web"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="result results_links web-result">
          <h2 class="result__title">
            <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">Rust <b>Programming</b> Language</a>
          </h2>
          <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">A language empowering everyone &amp; more.</a>
        </div>
        <div class="result">
          <a class="result__a" href="https://doc.rust-lang.org/book/">The   Book</a>
          <div class="result__snippet">Learn <b>Rust</b></div>
        </div>
        <div class="result">
          <a class="result__a" href="javascript:void(0)">Broken</a>
        </div>
    "#;

    #[test]
    fn test_parse_results_page() {
        let parser = ResultParser::new().unwrap();
        let results = parser.parse(PAGE, 10);
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].title, "Rust Programming Language");
        assert_eq!(results[0].url, "https://www.rust-lang.org/");
        assert_eq!(results[0].source, "rust-lang.org");
        assert_eq!(results[0].snippet, "A language empowering everyone & more.");

        assert_eq!(results[1].title, "The Book");
        assert_eq!(results[1].source, "doc.rust-lang.org");
        assert_eq!(results[1].snippet, "Learn Rust");
    }

    #[test]
    fn test_parse_respects_limit() {
        let parser = ResultParser::new().unwrap();
        assert_eq!(parser.parse(PAGE, 1).len(), 1);
        assert!(parser.parse("<html>nothing</html>", 10).is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        // Port 9 (discard) on localhost is closed in test environments.
        let provider =
            WebResultProvider::new("http://127.0.0.1:9/html/", Duration::from_secs(2)).unwrap();
        let results = provider
            .fetch_results("rust", SearchType::Search, "Sonar")
            .await
            .unwrap();
        assert_eq!(results.web_results.len(), 1);
        assert_eq!(results.web_results[0].source, "Mock Data");
        assert_eq!(results.ai_analysis.model, "Sonar");
    }
}
