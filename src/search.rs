//! Web search providers.

use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use url::Url;

use crate::backend::{DEFAULT_TIMEOUT, http_client};
use crate::{Error, Result, WebSearchResult};

const DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com/";

/// Number of results a `/web` lookup asks for.
pub const DEFAULT_WEB_RESULTS: usize = 10;

/// A web search engine.
#[async_trait::async_trait]
pub trait WebSearch: Send + Sync {
    /// A short answer or summary for `query`; empty when the provider has none.
    async fn chat(&self, query: &str) -> Result<String>;

    /// Up to `max_results` ranked hits for `query`.
    async fn text_search(&self, query: &str, max_results: usize) -> Result<Vec<WebSearchResult>>;
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    abstract_text: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

impl InstantAnswer {
    fn summary(&self) -> String {
        if !self.abstract_text.is_empty() {
            self.abstract_text.clone()
        } else {
            self.answer.clone()
        }
    }

    fn results(self, max_results: usize) -> Vec<WebSearchResult> {
        let mut results = Vec::new();
        flatten(self.related_topics, &mut results);
        results.truncate(max_results);
        results
    }
}

fn flatten(topics: Vec<RelatedTopic>, out: &mut Vec<WebSearchResult>) {
    for topic in topics {
        match topic {
            RelatedTopic::Topic { text, first_url } => {
                let title = text
                    .split_once(" - ")
                    .map(|(title, _)| title.to_string())
                    .unwrap_or_else(|| text.clone());
                out.push(WebSearchResult {
                    title,
                    body: text,
                    url: first_url,
                });
            }
            RelatedTopic::Group { topics } => flatten(topics, out),
        }
    }
}

/// DuckDuckGo's instant-answer API.
#[derive(Debug, Clone)]
pub struct DuckDuckGo {
    client: ReqwestClient,
    base_url: Url,
}

impl DuckDuckGo {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DUCKDUCKGO_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: Url::parse(base_url)?,
        })
    }

    async fn instant_answer(&self, query: &str) -> Result<InstantAnswer> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "json")
            .append_pair("no_html", "1")
            .append_pair("skip_disambig", "1");
        let response = self
            .client
            .get(url)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::from_send(e, Some(DEFAULT_TIMEOUT.as_secs_f64())))?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        // The API answers with content-type application/x-javascript
        let body = response.text().await.map_err(|e| {
            Error::http_client(format!("Failed to read search response: {e}"), Some(Box::new(e)))
        })?;
        if body.trim().is_empty() {
            return Ok(InstantAnswer::default());
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl WebSearch for DuckDuckGo {
    async fn chat(&self, query: &str) -> Result<String> {
        Ok(self.instant_answer(query).await?.summary())
    }

    async fn text_search(&self, query: &str, max_results: usize) -> Result<Vec<WebSearchResult>> {
        Ok(self.instant_answer(query).await?.results(max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> InstantAnswer {
        serde_json::from_value(json!({
            "AbstractText": "Rust is a programming language.",
            "Answer": "",
            "RelatedTopics": [
                {"Text": "Cargo - The Rust package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                {"Name": "Tools", "Topics": [
                    {"Text": "Clippy - A linter", "FirstURL": "https://duckduckgo.com/Clippy"},
                    {"Text": "rustfmt", "FirstURL": "https://duckduckgo.com/rustfmt"}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn summary_prefers_abstract() {
        assert_eq!(sample().summary(), "Rust is a programming language.");
        let answer: InstantAnswer =
            serde_json::from_value(json!({"AbstractText": "", "Answer": "42"})).unwrap();
        assert_eq!(answer.summary(), "42");
    }

    #[test]
    fn related_topics_flatten_in_rank_order() {
        let results = sample().results(DEFAULT_WEB_RESULTS);
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Cargo", "Clippy", "rustfmt"]);
        assert_eq!(results[0].body, "Cargo - The Rust package manager");
        assert_eq!(results[2].url, "https://duckduckgo.com/rustfmt");
    }

    #[test]
    fn results_are_capped() {
        assert_eq!(sample().results(2).len(), 2);
    }
}
