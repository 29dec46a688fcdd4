//! Streaming client for the local model service.
//!
//! The trait is the seam the engine depends on; [`LocalModelClient`]
//! implements it over the runner's OpenAI-style HTTP surface. The client
//! carries no staleness logic at all: it delivers whatever the transport
//! produces, and the session manager decides what is still relevant.

use async_trait::async_trait;
use futures_util::{
  StreamExt,
  TryStreamExt,
  future,
  stream::{
    self,
    BoxStream,
  },
};
use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

/// Default local model service endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11434";

const COMPLETIONS_PATH: &str = "/v1/completions";

/// Stream terminator used by the completion endpoint.
const DONE_SENTINEL: &str = "[DONE]";

/// Outbound completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
  pub prompt:     String,
  pub max_tokens: u32,
  pub stream:     bool,
}

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("failed to reach model service: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("model service returned HTTP {0}")]
  Status(reqwest::StatusCode),
  #[error("malformed stream payload: {0}")]
  Payload(#[from] serde_json::Error),
}

/// Text fragments in arrival order, ending after the final fragment or
/// with a single error.
pub type FragmentStream = BoxStream<'static, Result<String, ClientError>>;

/// Issues completion requests against the model service.
///
/// Pass-through delivery only: fragments are yielded in send order for a
/// single request, and the stream ends when the service finalizes the
/// completion. No payload accompanies finalization; trailing text, if a
/// transport ever produces it, must be yielded as an ordinary fragment
/// before end-of-stream. Correlation ids are assigned by the caller and
/// never seen here; the session manager records a session before the
/// request task runs, so no fragment can reference an unknown id.
#[async_trait]
pub trait CompletionClient: Send + Sync + 'static {
  async fn complete(&self, request: CompletionRequest) -> Result<FragmentStream, ClientError>;
}

/// `data:` frame payloads from the completion endpoint.
#[derive(Debug, Deserialize)]
struct CompletionChunk {
  #[serde(default)]
  choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
  #[serde(default)]
  text: String,
}

/// Incremental decoder for SSE `data:` lines.
///
/// Network chunks split anywhere, including inside a multi-byte
/// character, so bytes are buffered until a full line is available and
/// only complete lines are decoded.
#[derive(Default)]
struct SseDecoder {
  buf: Vec<u8>,
}

impl SseDecoder {
  /// Buffer `bytes` and drain every complete `data:` payload.
  fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
    self.buf.extend_from_slice(bytes);
    let mut payloads = Vec::new();
    while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
      let line: Vec<u8> = self.buf.drain(..=pos).collect();
      let line = String::from_utf8_lossy(&line);
      let line = line.trim_end_matches(['\n', '\r']);
      if let Some(payload) = line.strip_prefix("data:") {
        let payload = payload.trim_start();
        if !payload.is_empty() {
          payloads.push(payload.to_owned());
        }
      }
    }
    payloads
  }
}

fn parse_fragment(payload: &str) -> Result<String, ClientError> {
  let chunk: CompletionChunk = serde_json::from_str(payload)?;
  Ok(
    chunk
      .choices
      .into_iter()
      .map(|choice| choice.text)
      .collect(),
  )
}

/// HTTP client for the local model runner.
pub struct LocalModelClient {
  endpoint: String,
  http:     reqwest::Client,
}

impl LocalModelClient {
  pub fn new() -> Self {
    LocalModelClient {
      endpoint: DEFAULT_ENDPOINT.to_string(),
      http:     reqwest::Client::new(),
    }
  }

  pub fn with_endpoint(mut self, endpoint: &str) -> Self {
    self.endpoint = endpoint.trim_end_matches('/').to_string();
    self
  }

  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }
}

impl Default for LocalModelClient {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl CompletionClient for LocalModelClient {
  async fn complete(&self, request: CompletionRequest) -> Result<FragmentStream, ClientError> {
    let url = format!("{}{}", self.endpoint, COMPLETIONS_PATH);
    let response = self.http.post(&url).json(&request).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(ClientError::Status(status));
    }

    let mut decoder = SseDecoder::default();
    let fragments = response
      .bytes_stream()
      .map_err(ClientError::from)
      .map_ok(move |bytes| {
        stream::iter(decoder.feed(&bytes).into_iter().map(Ok::<_, ClientError>))
      })
      .try_flatten()
      .try_take_while(|payload| future::ready(Ok(payload.as_str() != DONE_SENTINEL)))
      .and_then(|payload| future::ready(parse_fragment(&payload)))
      .try_filter(|fragment| future::ready(!fragment.is_empty()));

    Ok(fragments.boxed())
  }
}
