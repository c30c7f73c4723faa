use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::turn::ChatMessage;

/// Streaming language-model completion backend
///
/// One call per turn. The receiver yields incremental text deltas; an `Err`
/// item means the stream failed mid-flight and no further deltas follow.
/// Request-level failures (connect error, non-success status) surface as an
/// `Err` from `stream_chat` itself.
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
    ) -> Result<mpsc::UnboundedReceiver<Result<String>>>;
}

/// Chat backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// System prompt seeding every session's history
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://integrate.api.nvidia.com/v1".to_string(),
            model: "meta/llama3-8b-instruct".to_string(),
            api_key_env: "NVAPI_KEY".to_string(),
            temperature: 0.5,
            top_p: 1.0,
            max_tokens: 256,
            system_prompt: "You are a helpful assistant. You answer in a conversational tone. \
                            Keep your messages brief to allow a quick exchange of dialogue."
                .to_string(),
        }
    }
}

/// Streaming client for OpenAI-compatible chat completion endpoints
pub struct OpenAiChatBackend {
    client: reqwest::Client,
    config: ChatConfig,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ChunkDelta {
    content: Option<String>,
}

impl OpenAiChatBackend {
    /// Read the API key from the configured environment variable.
    pub fn new(config: ChatConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("Missing API key in ${}", config.api_key_env))?;

        info!(
            "Chat backend ready: {} ({})",
            config.base_url, config.model
        );

        Ok(Self {
            client: reqwest::Client::new(),
            config,
            api_key,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
    ) -> Result<mpsc::UnboundedReceiver<Result<String>>> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
            stream: true,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Chat completion request failed")?;

        if !response.status().is_success() {
            bail!("Chat completion returned status {}", response.status());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_sse_deltas(response.bytes_stream(), tx));
        Ok(rx)
    }
}

/// Read an SSE byte stream and forward content deltas.
///
/// Lines arrive as `data: <json>` records terminated by a `data: [DONE]`
/// marker. A malformed data line or a mid-stream read error aborts the
/// stream with an `Err` delta; the caller treats the turn as failed.
async fn forward_sse_deltas(
    body: impl Stream<Item = reqwest::Result<Bytes>>,
    tx: mpsc::UnboundedSender<Result<String>>,
) {
    futures::pin_mut!(body);
    let mut buffer = BytesMut::with_capacity(8192);

    loop {
        while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
            let line_bytes = buffer.split_to(newline + 1);
            let line = String::from_utf8_lossy(&line_bytes);

            match parse_sse_line(line.trim()) {
                Ok(SseEvent::Delta(delta)) => {
                    if tx.send(Ok(delta)).is_err() {
                        return; // consumer gone (barge-in)
                    }
                }
                Ok(SseEvent::Done) => return,
                Ok(SseEvent::Skip) => {}
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            }
        }

        match body.next().await {
            Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
            Some(Err(e)) => {
                let _ = tx.send(Err(anyhow!(e).context("Chat stream read failed")));
                return;
            }
            None => return,
        }
    }
}

enum SseEvent {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> Result<SseEvent> {
    // Empty lines separate SSE records; ':' prefixes comments.
    if line.is_empty() || line.starts_with(':') {
        return Ok(SseEvent::Skip);
    }

    let Some(data) = line.strip_prefix("data:") else {
        debug!("Ignoring non-data SSE line: {}", line);
        return Ok(SseEvent::Skip);
    };
    let data = data.trim();

    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .with_context(|| format!("Malformed chat completion chunk: {}", data))?;

    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
    {
        Some(content) => Ok(SseEvent::Delta(content)),
        None => Ok(SseEvent::Skip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delta_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        match parse_sse_line(line).unwrap() {
            SseEvent::Delta(d) => assert_eq!(d, "Hi"),
            _ => panic!("expected delta"),
        }
    }

    #[test]
    fn test_parse_done_marker() {
        assert!(matches!(
            parse_sse_line("data: [DONE]").unwrap(),
            SseEvent::Done
        ));
    }

    #[test]
    fn test_parse_skips_empty_and_comments() {
        assert!(matches!(parse_sse_line("").unwrap(), SseEvent::Skip));
        assert!(matches!(
            parse_sse_line(": keep-alive").unwrap(),
            SseEvent::Skip
        ));
    }

    #[test]
    fn test_parse_skips_role_only_delta() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert!(matches!(parse_sse_line(line).unwrap(), SseEvent::Skip));
    }

    #[test]
    fn test_parse_malformed_chunk_is_error() {
        assert!(parse_sse_line("data: {not json").is_err());
    }
}
