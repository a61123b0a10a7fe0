//! `SearchProvider` trait and the concrete `HttpSearchProvider` adapter (A3).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::SearchError;

#[derive(Debug, Clone, Serialize)]
struct SearchRequestWire<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    include_answer: bool,
    max_results: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResponseWire {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchResultWire>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResultWire {
    title: String,
    url: String,
    content: String,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub query: String,
    pub answer: Option<String>,
    pub results: Vec<SearchResult>,
}

impl SearchResponse {
    /// Renders the response as the plain text a tool-call result carries:
    /// top 5 results, each content truncated at 500 chars (§6 "Wire to Search").
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(answer) = &self.answer {
            out.push_str("Answer: ");
            out.push_str(answer);
            out.push('\n');
        }
        for (i, result) in self.results.iter().take(5).enumerate() {
            let truncated: String = result.content.chars().take(500).collect();
            out.push_str(&format!("{}. {} ({})\n{}\n", i + 1, result.title, result.url, truncated));
        }
        out
    }
}

/// Out-of-scope collaborator (§1): the web-search provider is treated as an
/// opaque tool with a fixed request/response shape.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError>;
}

pub struct HttpSearchProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpSearchProvider {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let body = SearchRequestWire {
            api_key: &self.api_key,
            query,
            search_depth: "basic",
            include_answer: true,
            max_results: 5,
        };

        let response = self
            .http
            .post(&self.base_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: SearchResponseWire = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        Ok(SearchResponse {
            query: query.to_string(),
            answer: parsed.answer,
            results: parsed
                .results
                .into_iter()
                .map(|r| SearchResult {
                    title: r.title,
                    url: r.url,
                    content: r.content,
                    score: r.score,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_truncates_content_and_caps_at_five_results() {
        let response = SearchResponse {
            query: "test".to_string(),
            answer: Some("short answer".to_string()),
            results: (0..7)
                .map(|i| SearchResult {
                    title: format!("Result {i}"),
                    url: format!("https://example.com/{i}"),
                    content: "x".repeat(600),
                    score: 1.0,
                })
                .collect(),
        };

        let rendered = response.render();
        assert!(rendered.contains("Answer: short answer"));
        assert_eq!(rendered.matches("Result").count(), 5);
        let first_block = rendered.split("1. ").nth(1).unwrap();
        let content_line = first_block.lines().nth(1).unwrap();
        assert_eq!(content_line.chars().count(), 500);
    }
}
