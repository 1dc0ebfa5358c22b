use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use super::{CollectionHandle, QueryInput, VectorStore};
use crate::backend::{DEFAULT_TIMEOUT, http_client, parse_base_url};
use crate::{Error, Result, RetrievalResult};

const INCLUDE: [&str; 3] = ["documents", "metadatas", "distances"];

#[derive(Deserialize)]
struct CollectionEntry {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct CreateCollection<'a> {
    name: &'a str,
    get_or_create: bool,
}

#[derive(Serialize)]
struct QueryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    query_texts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_embeddings: Option<Vec<Vec<f32>>>,
    n_results: usize,
    include: [&'static str; 3],
}

impl QueryRequest {
    fn new(input: QueryInput, n_results: usize) -> Self {
        let (query_texts, query_embeddings) = match input {
            QueryInput::Text(text) => (Some(vec![text]), None),
            QueryInput::Embedding(embedding) => (None, Some(vec![embedding])),
        };
        Self {
            query_texts,
            query_embeddings,
            n_results,
            include: INCLUDE,
        }
    }
}

/// Chroma answers one list per query; only the first query is ever sent.
#[derive(Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl QueryResponse {
    fn into_results(self) -> Vec<RetrievalResult> {
        let documents = first(self.documents).unwrap_or_default();
        let metadatas = first(self.metadatas).unwrap_or_default();
        let distances = first(self.distances).unwrap_or_default();
        // An empty metadata list means no hits even if documents came back
        if metadatas.is_empty() {
            return Vec::new();
        }
        documents
            .into_iter()
            .zip(metadatas)
            .zip(distances)
            .map(|((document, metadata), distance)| RetrievalResult {
                document: document.unwrap_or_default(),
                distance: distance.unwrap_or(0.0),
                metadata: metadata.unwrap_or_default(),
            })
            .collect()
    }
}

fn first<T>(lists: Option<Vec<Vec<T>>>) -> Option<Vec<T>> {
    lists.and_then(|l| l.into_iter().next())
}

/// HTTP client for a Chroma server.
#[derive(Debug, Clone)]
pub struct Chroma {
    client: ReqwestClient,
    base_url: Url,
}

impl Chroma {
    /// Creates a client for the server at `host:port`.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        Self::with_base_url(&format!("http://{host}:{port}"))
    }

    /// Creates a client for the server at `base_url`.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// The server this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn unavailable(&self, e: reqwest::Error) -> Error {
        Error::store_unavailable(
            format!("Chroma is not reachable at {}: {e}", self.base_url),
            Some(Box::new(e)),
        )
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        response.json::<T>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse Chroma response: {e}"),
                Some(Box::new(e)),
            )
        })
    }
}

#[async_trait::async_trait]
impl VectorStore for Chroma {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let url = self.base_url.join("api/v1/collections")?;
        let response = self
            .client
            .get(url)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        let collections: Vec<CollectionEntry> = Self::parse(response).await?;
        Ok(collections.into_iter().map(|c| c.name).collect())
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle> {
        let url = self.base_url.join("api/v1/collections")?;
        let response = self
            .client
            .post(url)
            .timeout(DEFAULT_TIMEOUT)
            .json(&CreateCollection {
                name,
                get_or_create: true,
            })
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        let collection: CollectionEntry = Self::parse(response).await?;
        Ok(CollectionHandle::new(collection.id, collection.name))
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        input: QueryInput,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let url = self
            .base_url
            .join(&format!("api/v1/collections/{}/query", collection.id))?;
        let response = self
            .client
            .post(url)
            .timeout(DEFAULT_TIMEOUT)
            .json(&QueryRequest::new(input, k))
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        let body: QueryResponse = Self::parse(response).await?;
        Ok(body.into_results())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn base_url_from_host_and_port() {
        let chroma = Chroma::new("localhost", 8000).unwrap();
        assert_eq!(chroma.base_url().as_str(), "http://localhost:8000/");
    }

    #[test]
    fn text_query_wire_format() {
        let request = QueryRequest::new(QueryInput::Text("what is rust".to_string()), 3);
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "query_texts": ["what is rust"],
                "n_results": 3,
                "include": ["documents", "metadatas", "distances"]
            })
        );
    }

    #[test]
    fn embedding_query_wire_format() {
        let request = QueryRequest::new(QueryInput::Embedding(vec![0.5, 0.25]), 1);
        let value = to_value(&request).unwrap();
        assert_eq!(value["query_embeddings"], json!([[0.5, 0.25]]));
        assert!(value.get("query_texts").is_none());
    }

    #[test]
    fn query_response_keeps_store_order() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["a", "b"]],
            "documents": [["first", "second"]],
            "metadatas": [[{"title": "A", "url": "https://a"}, null]],
            "distances": [[0.1, 0.7]]
        }))
        .unwrap();
        let results = response.into_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document, "first");
        assert_eq!(results[0].title(), Some("A"));
        assert_eq!(results[1].distance, 0.7);
        assert!(results[1].metadata.is_empty());
    }

    #[test]
    fn empty_metadata_means_no_results() {
        let response: QueryResponse = serde_json::from_value(json!({
            "documents": [[]],
            "metadatas": [[]],
            "distances": [[]]
        }))
        .unwrap();
        assert!(response.into_results().is_empty());
        assert!(QueryResponse::default().into_results().is_empty());
    }
}
