//! Vector store and embedding-model interfaces.

mod chroma;

use crate::{Result, RetrievalResult};

pub use chroma::Chroma;

/// A collection the session can query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    /// The store's identifier for the collection.
    pub id: String,
    /// The collection's name.
    pub name: String,
}

impl CollectionHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// What a similarity query is matched against.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// Raw text, embedded by the store.
    Text(String),
    /// A vector produced by an [`Embedder`].
    Embedding(Vec<f32>),
}

/// A vector database partitioned into named collections.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Names of the collections in the store.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Loads the named collection, creating it when absent.
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle>;

    /// Returns up to `k` results in ascending distance.
    async fn query(
        &self,
        collection: &CollectionHandle,
        input: QueryInput,
        k: usize,
    ) -> Result<Vec<RetrievalResult>>;
}

/// A sentence-embedding model.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    /// The model identifier.
    fn model(&self) -> &str;

    /// Encodes `text` into a vector.
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;
}
