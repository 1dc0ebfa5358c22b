use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A passage returned by the vector store for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The stored document text.
    pub document: String,

    /// Distance from the query; smaller is more relevant.
    pub distance: f64,

    /// Arbitrary metadata stored alongside the document.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RetrievalResult {
    /// Create a result with empty metadata.
    pub fn new(document: impl Into<String>, distance: f64) -> Self {
        Self {
            document: document.into(),
            distance,
            metadata: Map::new(),
        }
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `title` metadata entry, if it is a non-empty string.
    pub fn title(&self) -> Option<&str> {
        self.metadata_str("title")
    }

    /// The `url` metadata entry, if it is a non-empty string.
    pub fn url(&self) -> Option<&str> {
        self.metadata_str("url")
    }

    /// The `filePath` metadata entry, if it is a non-empty string.
    pub fn file_path(&self) -> Option<&str> {
        self.metadata_str("filePath")
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// One ranked hit from a web search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchResult {
    /// Title of the page.
    pub title: String,

    /// Snippet of the page body.
    pub body: String,

    /// Link to the page.
    #[serde(alias = "href")]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_accessors_skip_empty_and_non_strings() {
        let result = RetrievalResult::new("doc", 0.2)
            .with_metadata("title", "Title")
            .with_metadata("url", "")
            .with_metadata("filePath", 7);
        assert_eq!(result.title(), Some("Title"));
        assert_eq!(result.url(), None);
        assert_eq!(result.file_path(), None);
    }

    #[test]
    fn web_result_accepts_href() {
        let result: WebSearchResult =
            serde_json::from_str(r#"{"title":"t","body":"b","href":"https://x"}"#).unwrap();
        assert_eq!(result.url, "https://x");
    }
}
