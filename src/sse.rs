//! Line-framed response streams.
//!
//! Ollama streams newline-delimited JSON objects and OpenAI-compatible servers
//! stream Server-Sent Events whose `data:` lines carry JSON.  Both are line
//! framed, so one buffering state machine turns an HTTP byte stream into a
//! stream of text chunks and each framing supplies its own line decoder.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::observability::{STREAM_BYTES, STREAM_ERRORS};
use crate::{Error, Result};

/// The outcome of decoding one line of a response stream.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Decoded {
    /// Text carried by the line, if any.
    pub text: Option<String>,
    /// True if the line marks the end of the response.
    pub finished: bool,
}

impl Decoded {
    fn skip() -> Self {
        Self::default()
    }

    fn text(text: String) -> Self {
        Self {
            text: Some(text).filter(|t| !t.is_empty()),
            finished: false,
        }
    }

    fn finished(text: Option<String>) -> Self {
        Self {
            text: text.filter(|t| !t.is_empty()),
            finished: true,
        }
    }
}

/// Turns a byte stream into a stream of text chunks using `decode` per line.
pub(crate) fn process_lines<S, D>(byte_stream: S, decode: D) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
    D: Fn(&str) -> Result<Decoded> + Copy + Send + 'static,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result.map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let buffer: Vec<u8> = Vec::new();
    let done = false;

    stream::unfold(
        (stream, buffer, done),
        move |(mut stream, mut buffer, mut done)| async move {
            loop {
                if done {
                    return None;
                }

                // First drain complete lines already in the buffer
                let line = match pop_line(&mut buffer) {
                    Some(line) => Some(line),
                    None => match stream.next().await {
                        Some(Ok(bytes)) => {
                            STREAM_BYTES.count(bytes.len() as u64);
                            buffer.extend_from_slice(&bytes);
                            continue;
                        }
                        Some(Err(e)) => {
                            STREAM_ERRORS.click();
                            done = true;
                            return Some((Err(e), (stream, buffer, done)));
                        }
                        None => {
                            // End of stream; whatever is left is the last line
                            done = true;
                            if buffer.iter().all(u8::is_ascii_whitespace) {
                                return None;
                            }
                            Some(std::mem::take(&mut buffer))
                        }
                    },
                };

                let Some(line) = line else {
                    continue;
                };
                let decoded = std::str::from_utf8(&line)
                    .map_err(Error::from)
                    .and_then(|line| decode(line.trim_end_matches('\r')));
                match decoded {
                    Ok(decoded) => {
                        done = done || decoded.finished;
                        if let Some(text) = decoded.text {
                            return Some((Ok(text), (stream, buffer, done)));
                        }
                    }
                    Err(e) => {
                        STREAM_ERRORS.click();
                        done = true;
                        return Some((Err(e), (stream, buffer, done)));
                    }
                }
            }
        },
    )
}

/// Removes and returns the first complete line (without its newline).
fn pop_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let newline = buffer.iter().position(|b| *b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=newline).collect();
    line.pop();
    Some(line)
}

/// Decodes one line of an Ollama `/api/chat` stream.
pub(crate) fn decode_ndjson_line(line: &str) -> Result<Decoded> {
    #[derive(Deserialize)]
    struct ChatChunk {
        message: Option<ChunkMessage>,
        #[serde(default)]
        done: bool,
        error: Option<String>,
    }

    #[derive(Deserialize)]
    struct ChunkMessage {
        #[serde(default)]
        content: String,
    }

    let line = line.trim();
    if line.is_empty() {
        return Ok(Decoded::skip());
    }
    let chunk: ChatChunk = serde_json::from_str(line).map_err(|e| {
        Error::serialization(format!("Failed to parse chunk JSON: {e}"), Some(Box::new(e)))
    })?;
    if let Some(error) = chunk.error {
        return Err(Error::api(500, error));
    }
    let text = chunk.message.map(|m| m.content);
    if chunk.done {
        Ok(Decoded::finished(text))
    } else {
        Ok(Decoded::text(text.unwrap_or_default()))
    }
}

/// Decodes one line of an OpenAI-compatible `/v1/chat/completions` SSE stream.
pub(crate) fn decode_sse_line(line: &str) -> Result<Decoded> {
    #[derive(Deserialize)]
    struct CompletionChunk {
        #[serde(default)]
        choices: Vec<ChunkChoice>,
    }

    #[derive(Deserialize)]
    struct ChunkChoice {
        delta: Option<ChunkDelta>,
    }

    #[derive(Deserialize)]
    struct ChunkDelta {
        content: Option<String>,
    }

    // Comments, `event:` and `id:` lines, and event separators carry no text
    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
        return Ok(Decoded::skip());
    };
    if data == "[DONE]" {
        return Ok(Decoded::finished(None));
    }
    let chunk: CompletionChunk = serde_json::from_str(data).map_err(|e| {
        Error::serialization(format!("Failed to parse event JSON: {e}"), Some(Box::new(e)))
    })?;
    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .unwrap_or_default();
    Ok(Decoded::text(text))
}
