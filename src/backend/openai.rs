use std::env;
use std::time::Instant;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    ChatBackend, ChatOptions, ChatResponse, DEFAULT_TIMEOUT, ModelInfo, http_client,
    parse_base_url,
};
use crate::observability::{BACKEND_REQUESTS, BACKEND_REQUEST_DURATION, BACKEND_REQUEST_ERRORS};
use crate::sse::{decode_sse_line, process_lines};
use crate::{Error, Message, Result};

const DEFAULT_OPENAI_URL: &str = "http://127.0.0.1:8080/";

/// The model requested when the server does not list any.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Client for a server speaking the OpenAI chat-completions protocol.
///
/// Local inference servers (llama.cpp, vLLM, LM Studio) usually need no key;
/// when `OPENAI_API_KEY` is set it is sent as a bearer token.
#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
    client: ReqwestClient,
    base_url: Url,
    api_key: Option<String>,
}

impl OpenAiCompatible {
    /// Creates a client for the server at `http://127.0.0.1:8080`.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_OPENAI_URL)
    }

    /// Creates a client for the server at `base_url`.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: parse_base_url(base_url)?,
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
        })
    }

    /// Replaces the API key.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// The server this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Some(api_key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                Error::configuration("OPENAI_API_KEY is not a valid header value", Some(Box::new(e)))
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenAiCompatible {
    fn name(&self) -> &str {
        "openai"
    }

    fn uses_prompt_template(&self) -> bool {
        true
    }

    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        let url = self.base_url.join("v1/chat/completions")?;
        let request = CompletionRequest {
            model: &options.model,
            messages,
            temperature: options.temperature,
            stream: options.stream,
        };

        BACKEND_REQUESTS.click();
        let start = Instant::now();
        let mut builder = self
            .client
            .post(url)
            .headers(self.default_headers()?)
            .json(&request);
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
            let stream = process_lines(response.bytes_stream(), decode_sse_line);
            return Ok(ChatResponse::Stream(Box::pin(stream)));
        }

        let completion = response.json::<CompletionResponse>().await.map_err(|e| {
            BACKEND_REQUEST_ERRORS.click();
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })?;
        BACKEND_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(ChatResponse::Complete(text))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.base_url.join("v1/models")?;
        let response = self
            .client
            .get(url)
            .headers(self.default_headers()?)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                Error::backend_unavailable(
                    format!("OpenAI-compatible server is not reachable at {}: {e}", self.base_url),
                    Some(Box::new(e)),
                )
            })?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        let models = response.json::<ModelsResponse>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse model list: {e}"), Some(Box::new(e)))
        })?;
        Ok(models.data.into_iter().map(|m| ModelInfo::new(m.id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn client_creation() {
        let client = OpenAiCompatible::new().unwrap().with_api_key(None);
        assert_eq!(client.base_url().as_str(), DEFAULT_OPENAI_URL);
        assert_eq!(client.name(), "openai");
        assert!(client.uses_prompt_template());
        let headers = client.default_headers().unwrap();
        assert!(headers.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn api_key_becomes_bearer_header() {
        let client = OpenAiCompatible::new()
            .unwrap()
            .with_api_key(Some("sk-local".to_string()));
        let headers = client.default_headers().unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer sk-local");
    }

    #[test]
    fn completion_request_wire_format() {
        let messages = vec![Message::user("U")];
        let request = CompletionRequest {
            model: DEFAULT_OPENAI_MODEL,
            messages: &messages,
            temperature: 0.0,
            stream: false,
        };
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "U"}],
                "temperature": 0.0,
                "stream": false
            })
        );
    }

    #[test]
    fn completion_response_parses() {
        let response: CompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi"}}]
        }))
        .unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("Hi"));
    }

    #[test]
    fn models_response_parses() {
        let models: ModelsResponse = serde_json::from_value(json!({
            "object": "list",
            "data": [{"id": "llama-3-8b", "object": "model"}]
        }))
        .unwrap();
        assert_eq!(models.data[0].id, "llama-3-8b");
    }
}
