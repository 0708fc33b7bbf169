//! Anthropic Messages API backend with SSE streaming
//!
//! Opens `POST /v1/messages` with `stream: true` and translates the
//! server-sent event stream into [`StreamEvent`]s. Input token counts arrive
//! on the `message_start` frame, output counts on `message_delta`, and the
//! stream is complete at `message_stop`, at which point the accumulated
//! accounting is emitted exactly once as [`StreamEvent::Completed`].

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::TokenUsage;

use super::{GenerationBackend, GenerationRequest, GenerationStream, StreamEvent};

/// API version header required by the Messages API
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Production backend speaking the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicBackend {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl AnthropicBackend {
    /// Create a backend from the shared configuration.
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    async fn stream_generation(&self, request: GenerationRequest) -> Result<GenerationStream> {
        let api_key = self.config.resolved_api_key()?;
        let url = format!(
            "{}/v1/messages",
            self.config.api_base_url.trim_end_matches('/')
        );

        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            stream: true,
            // Cache the system instructions across the retry attempt and
            // repeated runs of the same role
            system: vec![SystemBlock {
                block_type: "text",
                text: &request.system,
                cache_control: CacheControl { cache_type: "ephemeral" },
            }],
            messages: vec![Message {
                role: "user",
                content: &request.user,
            }],
        };

        tracing::debug!(
            role = %request.role,
            model = %request.model,
            max_tokens = request.max_tokens,
            "Opening streaming generation call"
        );

        let response = self
            .http
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Error::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, response).await);
        }

        Ok(sse_event_stream(response.bytes_stream().boxed()))
    }
}

/// Map a non-success HTTP response onto the crate error taxonomy.
async fn classify_status(status: reqwest::StatusCode, response: reqwest::Response) -> Error {
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let message = read_error_message(response).await;

    match status.as_u16() {
        429 => Error::RateLimited { retry_after },
        401 | 403 => Error::Authentication(message),
        code if status.is_server_error() => Error::Service {
            status: code,
            message,
        },
        code => Error::Unexpected(format!("HTTP {code}: {message}")),
    }
}

/// Extract the service's error message from a response body, falling back to
/// the raw text when the body is not the documented error envelope.
async fn read_error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) => envelope.error.message,
        Err(_) if !text.is_empty() => text,
        Err(_) => "no error detail provided".to_string(),
    }
}

/// Translate a raw SSE byte stream into [`StreamEvent`]s.
///
/// Frames are delimited by blank lines; each frame's `data:` payload is a
/// JSON object discriminated by its `type` field. A transport error or a
/// stream that ends before `message_stop` surfaces as an error item and
/// terminates the stream.
fn sse_event_stream(
    body: BoxStream<'static, std::result::Result<bytes::Bytes, reqwest::Error>>,
) -> GenerationStream {
    let reader = SseReader {
        body,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        usage: TokenUsage::default(),
        stopped: false,
        done: false,
    };

    futures::stream::unfold(reader, |mut reader| async move {
        loop {
            if reader.done {
                return None;
            }
            if let Some(event) = reader.pending.pop_front() {
                return Some((Ok(event), reader));
            }
            match reader.body.next().await {
                Some(Ok(chunk)) => {
                    reader.buffer.extend_from_slice(&chunk);
                    if let Err(e) = reader.drain_frames() {
                        reader.done = true;
                        return Some((Err(e), reader));
                    }
                }
                Some(Err(e)) => {
                    reader.done = true;
                    return Some((Err(Error::Network(e)), reader));
                }
                None => {
                    reader.done = true;
                    if reader.stopped {
                        return None;
                    }
                    return Some((
                        Err(Error::Stream(
                            "event stream ended before completion".to_string(),
                        )),
                        reader,
                    ));
                }
            }
        }
    })
    .boxed()
}

struct SseReader {
    body: BoxStream<'static, std::result::Result<bytes::Bytes, reqwest::Error>>,
    buffer: Vec<u8>,
    pending: VecDeque<StreamEvent>,
    usage: TokenUsage,
    /// Saw `message_stop`; `Completed` has been queued
    stopped: bool,
    /// Stream fully drained or aborted
    done: bool,
}

impl SseReader {
    /// Parse every complete frame currently in the buffer.
    fn drain_frames(&mut self) -> Result<()> {
        while let Some(end) = find_frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let frame = String::from_utf8_lossy(&frame);
            self.handle_frame(&frame)?;
            if self.stopped {
                break;
            }
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: &str) -> Result<()> {
        let data: String = frame
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|line| line.trim_start())
            .collect::<Vec<_>>()
            .join("\n");
        if data.is_empty() {
            return Ok(());
        }

        let payload: SsePayload = match serde_json::from_str(&data) {
            Ok(payload) => payload,
            Err(e) => {
                return Err(Error::Stream(format!("malformed event payload: {e}")));
            }
        };

        match payload {
            SsePayload::MessageStart { message } => {
                self.usage.input = message.usage.input_tokens;
            }
            SsePayload::ContentBlockDelta { delta } => {
                if let Some(text) = delta.text
                    && !text.is_empty()
                {
                    self.pending.push_back(StreamEvent::Delta(text));
                }
            }
            SsePayload::MessageDelta { usage } => {
                self.usage.output = usage.output_tokens;
                if let Some(input) = usage.input_tokens {
                    self.usage.input = input;
                }
            }
            SsePayload::MessageStop => {
                self.pending.push_back(StreamEvent::Completed(self.usage));
                self.stopped = true;
            }
            SsePayload::ErrorEvent { error } => {
                return Err(Error::Stream(format!(
                    "{}: {}",
                    error.error_type, error.message
                )));
            }
            SsePayload::Other => {} // ping and future event types
        }
        Ok(())
    }
}

/// Byte offset of the first blank-line frame delimiter, if a full frame is buffered.
fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    stream: bool,
    system: Vec<SystemBlock<'a>>,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct SystemBlock<'a> {
    #[serde(rename = "type")]
    block_type: &'a str,
    text: &'a str,
    cache_control: CacheControl,
}

#[derive(Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    cache_type: &'static str,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum SsePayload {
    #[serde(rename = "message_start")]
    MessageStart { message: MessageStart },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: ContentDelta },
    #[serde(rename = "message_delta")]
    MessageDelta { usage: DeltaUsage },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "error")]
    ErrorEvent { error: ApiError },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageStart {
    usage: StartUsage,
}

#[derive(Deserialize)]
struct StartUsage {
    input_tokens: u64,
}

#[derive(Deserialize)]
struct ContentDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct DeltaUsage {
    output_tokens: u64,
    #[serde(default)]
    input_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}
