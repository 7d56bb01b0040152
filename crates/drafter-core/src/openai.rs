//! OpenAI-compatible chat completions backend
//!
//! Sends `POST {base_url}/chat/completions` with the prompt as a single
//! user message. Streaming responses are server-sent events whose `data:`
//! lines carry JSON frames; the text delta is `choices[0].delta.content`
//! and the stream ends at `data: [DONE]`.

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ModelError};
use crate::model::{ChatModel, ChunkStream, ModelRequest};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::debug;

/// Chat model served over an OpenAI-compatible HTTP API
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    http: reqwest::Client,
    provider: ProviderConfig,
}

impl OpenAiChatModel {
    /// Create backend with a fresh HTTP client
    ///
    /// # Errors
    /// - `ConfigError::HttpClient` if the HTTP client cannot be built
    pub fn new(provider: ProviderConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self::with_client(provider, http))
    }

    /// Create backend sharing an existing HTTP client
    #[inline]
    #[must_use]
    pub fn with_client(provider: ProviderConfig, http: reqwest::Client) -> Self {
        Self { http, provider }
    }

    /// Provider settings
    #[inline]
    #[must_use]
    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct Frame {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Content>,
    #[serde(default)]
    message: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn open(&self, request: &ModelRequest) -> Result<ChunkStream, ModelError> {
        let body = ChatBody {
            model: &request.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            stream: request.stream,
        };

        debug!(model = %request.model, stream = request.stream, "Opening chat completion");

        let response = self
            .http
            .post(self.provider.completions_url())
            .bearer_auth(&self.provider.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if !request.stream {
            let frame: Frame = response.json().await?;
            let text = message_text(frame)?;
            let whole: ChunkStream = Box::pin(stream::once(async move { Ok::<_, ModelError>(text) }));
            return Ok(whole);
        }

        Ok(sse_chunks(Box::pin(response.bytes_stream())))
    }
}

fn message_text(frame: Frame) -> Result<String, ModelError> {
    if let Some(error) = frame.error {
        return Err(ModelError::Decode(format!("upstream error frame: {error}")));
    }
    Ok(frame
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default())
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

struct SseState {
    bytes: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

impl SseState {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Delta(text) => self.pending.push_back(text),
                SseEvent::Done => {
                    self.done = true;
                    break;
                }
            }
        }
    }
}

fn sse_chunks(bytes: ByteStream) -> ChunkStream {
    let state = SseState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                return Some((Ok(text), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => match state.decoder.feed(&chunk) {
                    Ok(events) => state.absorb(events),
                    Err(err) => {
                        state.done = true;
                        return Some((Err(err), state));
                    }
                },
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(err.into()), state));
                }
                None => {
                    state.done = true;
                    match state.decoder.finish() {
                        Ok(events) => state.absorb(events),
                        Err(err) => return Some((Err(err), state)),
                    }
                }
            }
        }
    }))
}

/// Decoded server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Text delta
    Delta(String),
    /// End of stream marker
    Done,
}

/// Incremental decoder for chat completion event streams
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network reads decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Create decoder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return the events completed by them
    ///
    /// # Errors
    /// - `ModelError::Decode` for invalid UTF-8, undecodable JSON or an
    ///   upstream error frame
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>, ModelError> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Flush a trailing line without newline
    ///
    /// # Errors
    /// - `ModelError::Decode` if the trailing line is malformed
    pub fn finish(&mut self) -> Result<Vec<SseEvent>, ModelError> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(parse_line(&rest)?.into_iter().collect())
    }
}

fn parse_line(raw: &[u8]) -> Result<Option<SseEvent>, ModelError> {
    let line = std::str::from_utf8(raw).map_err(|e| ModelError::Decode(e.to_string()))?;
    let line = line.trim_end_matches(&['\r', '\n'][..]);

    // Comments, event names and ids carry no text.
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim_start();
    if data.is_empty() {
        return Ok(None);
    }
    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let frame: Frame = serde_json::from_str(data).map_err(|e| ModelError::Decode(e.to_string()))?;
    if let Some(error) = frame.error {
        return Err(ModelError::Decode(format!("upstream error frame: {error}")));
    }
    Ok(frame
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|text| !text.is_empty())
        .map(SseEvent::Delta))
}
