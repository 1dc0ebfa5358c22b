//! Language-model backends.
//!
//! A backend answers a conversation with either one complete reply or a
//! stream of text chunks.  The session, the aggregator and the prompt
//! templates only see [`ChatBackend`] and [`ChatResponse`]; the wire formats of
//! the local Ollama server and OpenAI-compatible servers stay in their modules.

mod ollama;
mod openai;

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use reqwest::Client as ReqwestClient;
use url::Url;

use crate::{Error, Message, Result};

pub use ollama::{Ollama, OllamaEmbedder};
pub use openai::{DEFAULT_OPENAI_MODEL, OpenAiCompatible};

/// Timeout applied to non-streaming requests.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for establishing a connection.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// An ordered stream of incremental text fragments of one reply.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A reply from a backend.
pub enum ChatResponse {
    /// The whole reply at once.
    Complete(String),

    /// The reply as it is generated.
    Stream(ChunkStream),
}

impl std::fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatResponse::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            ChatResponse::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    /// The model identifier.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Ask for a streamed reply.
    pub stream: bool,
}

impl ChatOptions {
    /// Creates options for the given model with temperature 0 and streaming on.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            stream: true,
        }
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets whether the reply is streamed.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// A model offered by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// The model identifier.
    pub name: String,

    /// Size on disk in bytes, when the backend reports it.
    pub size: Option<u64>,
}

impl ModelInfo {
    /// Creates a model entry without a size.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
        }
    }

    /// Returns true if the model is known to reject the `system` role.
    pub fn lacks_system_role(&self) -> bool {
        model_lacks_system_role(&self.name)
    }

    /// A menu label such as `llama3:8b (4.3 GB)`.
    pub fn label(&self) -> String {
        match self.size {
            Some(size) => format!("{} ({})", self.name, bytes_to_gibibytes(size)),
            None => self.name.clone(),
        }
    }
}

/// Returns true for model families known to reject the `system` role.
pub fn model_lacks_system_role(name: &str) -> bool {
    name.to_ascii_lowercase().contains("gemma")
}

/// Formats a byte count as gibibytes with one decimal, e.g. `4.3 GB`.
pub fn bytes_to_gibibytes(bytes: u64) -> String {
    let gigabytes = bytes as f64 / (1024u64 * 1024 * 1024) as f64;
    format!("{gigabytes:.1} GB")
}

/// A language-model server.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// A short name for diagnostics, e.g. `ollama`.
    fn name(&self) -> &str;

    /// True when the server takes prompt-template framing from the client.
    ///
    /// Servers that template roles themselves get structured messages as-is.
    fn uses_prompt_template(&self) -> bool {
        false
    }

    /// Sends the conversation and returns the reply.
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse>;

    /// Lists the models the server offers.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

/// Parses a base URL and makes sure it ends in `/` so that `join` appends.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Builds the shared HTTP client.
///
/// Streaming requests can run for minutes, so the total timeout is applied per
/// request by callers that do not stream.
pub(crate) fn http_client() -> Result<ReqwestClient> {
    ReqwestClient::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })
}
