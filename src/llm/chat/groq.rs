use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE } };
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::{ create_streaming_response, ChatClient, FragmentStream };
use crate::config::GenerationParams;
use crate::llm::{ LlmConfig, LlmError };
use crate::models::chat::Message;

const PROVIDER: &str = "Groq";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GroqChatClient {
    http: HttpClient,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct GroqRequest<'a> {
    messages: &'a [Message],
    model: &'a str,
    #[serde(flatten)]
    params: &'a GenerationParams,
    stream: bool,
}

#[derive(Deserialize)]
struct GroqStreamResponse {
    #[serde(default)]
    choices: Vec<GroqStreamChoice>,
    #[serde(default)]
    error: Option<GroqStreamError>,
}

#[derive(Deserialize)]
struct GroqStreamChoice {
    #[serde(default)]
    delta: GroqDelta,
}

#[derive(Deserialize, Default)]
struct GroqDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct GroqStreamError {
    message: String,
}

/// What a single SSE line from the provider means for the relay.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseFrame {
    Fragment(String),
    Done,
    Skip,
}

/// Splits a chunked response body into complete lines.
///
/// Network chunks can end mid-line or mid-character, so bytes are held back
/// until a newline arrives.
#[derive(Default)]
pub(crate) struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).trim_end_matches('\r').to_string();
        self.pending.clear();
        Some(rest)
    }
}

pub(crate) fn parse_sse_line(line: &str) -> Result<SseFrame, LlmError> {
    let Some(data) = line.strip_prefix("data:") else {
        // blank separators, comments, event/id fields
        return Ok(SseFrame::Skip);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(SseFrame::Done);
    }

    let chunk: GroqStreamResponse = serde_json::from_str(data).map_err(|e| LlmError::Malformed {
        provider: PROVIDER,
        detail: format!("{} in chunk {}", e, data),
    })?;
    if let Some(err) = chunk.error {
        return Err(LlmError::Other(format!("{} stream error: {}", PROVIDER, err.message)));
    }

    let content = chunk.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty());
    Ok(content.map_or(SseFrame::Skip, SseFrame::Fragment))
}

impl GroqChatClient {
    pub fn new(
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|source| LlmError::Http { provider: PROVIDER, source })?;

        Ok(Self {
            http,
            api_key,
            model: chat_model,
            base_url: api_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(
            config.api_key.clone(),
            config.completion_model.clone(),
            config.base_url.clone(),
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatClient for GroqChatClient {
    async fn stream_chat(
        &self,
        messages: &[Message],
        params: &GenerationParams
    ) -> Result<FragmentStream, LlmError> {
        let api_key = self.api_key
            .as_deref()
            .ok_or(LlmError::MissingApiKey { provider: PROVIDER })?;
        let url = self.completions_url();

        let req = GroqRequest {
            messages,
            model: &self.model,
            params,
            stream: true,
        };

        info!("Starting Groq stream request to {} ({} messages)", url, messages.len());

        let resp = self.http
            .post(&url)
            .bearer_auth(api_key)
            .json(&req)
            .send().await
            .map_err(|source| LlmError::Http { provider: PROVIDER, source })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status { provider: PROVIDER, status, body });
        }

        let mut body = resp.bytes_stream();

        Ok(
            create_streaming_response(move |tx| async move {
                let mut lines = SseLineBuffer::default();

                loop {
                    // a stalled provider must not outlive the consumer
                    let chunk_result = tokio::select! {
                        _ = tx.closed() => {
                            debug!("Groq stream consumer gone, closing upstream response");
                            return;
                        }
                        next = body.next() => match next {
                            Some(chunk_result) => chunk_result,
                            None => break,
                        },
                    };
                    let chunk = match chunk_result {
                        Ok(chunk) => chunk,
                        Err(source) => {
                            let _ = tx.send(Err(LlmError::Http { provider: PROVIDER, source })).await;
                            return;
                        }
                    };
                    debug!("Groq raw chunk: {} bytes", chunk.len());

                    for line in lines.push(&chunk) {
                        match parse_sse_line(&line) {
                            Ok(SseFrame::Fragment(content)) => {
                                if tx.send(Ok(content)).await.is_err() {
                                    return;
                                }
                            }
                            Ok(SseFrame::Done) => {
                                return;
                            }
                            Ok(SseFrame::Skip) => {}
                            Err(e) => {
                                let _ = tx.send(Err(e)).await;
                                return;
                            }
                        }
                    }
                }

                if let Some(line) = lines.finish() {
                    match parse_sse_line(&line) {
                        Ok(SseFrame::Fragment(content)) => {
                            let _ = tx.send(Ok(content)).await;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                        }
                    }
                }
            })
        )
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
