use std::time::Instant;

use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    ChatBackend, ChatOptions, ChatResponse, DEFAULT_TIMEOUT, ModelInfo, http_client,
    parse_base_url,
};
use crate::observability::{BACKEND_REQUESTS, BACKEND_REQUEST_DURATION, BACKEND_REQUEST_ERRORS};
use crate::sse::{decode_ndjson_line, process_lines};
use crate::store::Embedder;
use crate::{Error, Message, Result};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatReply {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagsModel>,
}

#[derive(Deserialize)]
struct TagsModel {
    name: String,
    size: Option<u64>,
}

/// Client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct Ollama {
    client: ReqwestClient,
    base_url: Url,
}

impl Ollama {
    /// Creates a client for the server at `http://localhost:11434`.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
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
}

#[async_trait::async_trait]
impl ChatBackend for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        let url = self.base_url.join("api/chat")?;
        let request = ChatRequest {
            model: &options.model,
            messages,
            stream: options.stream,
            options: RequestOptions {
                temperature: options.temperature,
            },
        };

        BACKEND_REQUESTS.click();
        let start = Instant::now();
        let mut builder = self.client.post(url).json(&request);
        if !options.stream {
            builder = builder.timeout(DEFAULT_TIMEOUT);
        }
        let response = builder.send().await.map_err(|e| {
            BACKEND_REQUEST_ERRORS.click();
            Error::from_send(e, Some(DEFAULT_TIMEOUT.as_secs_f64()))
        })?;

        if !response.status().is_success() {
            BACKEND_REQUEST_ERRORS.click();
            return Err(Error::from_response(response).await);
        }

        if options.stream {
            let stream = process_lines(response.bytes_stream(), decode_ndjson_line);
            return Ok(ChatResponse::Stream(Box::pin(stream)));
        }

        let reply = response.json::<ChatReply>().await.map_err(|e| {
            BACKEND_REQUEST_ERRORS.click();
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })?;
        BACKEND_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        Ok(ChatResponse::Complete(reply.message.content))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.base_url.join("api/tags")?;
        let response = self
            .client
            .get(url)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                Error::backend_unavailable(
                    format!("Ollama is not reachable at {}: {e}", self.base_url),
                    Some(Box::new(e)),
                )
            })?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        let tags = response.json::<TagsResponse>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse model list: {e}"), Some(Box::new(e)))
        })?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name,
                size: m.size,
            })
            .collect())
    }
}

/// Sentence embeddings served by Ollama's `/api/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: ReqwestClient,
    base_url: Url,
    model: String,
}

impl OllamaEmbedder {
    /// Creates an embedder that uses `model` on the server at `base_url`.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: parse_base_url(base_url)?,
            model: model.into(),
        })
    }
}

#[async_trait::async_trait]
impl Embedder for OllamaEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct EmbeddingResponse {
            embedding: Vec<f32>,
        }

        let url = self.base_url.join("api/embeddings")?;
        let response = self
            .client
            .post(url)
            .timeout(DEFAULT_TIMEOUT)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| {
                Error::backend_unavailable(
                    format!("embedding model {} is not reachable: {e}", self.model),
                    Some(Box::new(e)),
                )
            })?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        let body = response.json::<EmbeddingResponse>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse embedding: {e}"), Some(Box::new(e)))
        })?;
        if body.embedding.is_empty() {
            return Err(Error::backend_unavailable(
                format!("embedding model {} returned an empty vector", self.model),
                None,
            ));
        }
        Ok(body.embedding)
    }
}
