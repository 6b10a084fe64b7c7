//! The streaming relay between `/chat` callers and the chat provider.
//!
//! Every invocation yields zero or more `text` events, at most one `error`
//! event, and always ends with the `[DONE]` terminator. Faults never escape
//! as `Err`: once the response headers are out the only way to report them
//! is in-band.

use futures::{ Future, Stream, StreamExt };
use log::{ debug, error, info };
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::llm::chat::ChatClient;
use crate::llm::LlmError;
use crate::models::chat::{ parse_messages, Message, MessageError, StreamEvent };

pub const DONE_MARKER: &str = "[DONE]";

const ERROR_PREFIX: &str = "Error generating response";
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// One unit of relay output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Event(StreamEvent),
    Done,
}

impl RelayFrame {
    /// Payload of the SSE `data:` field for this frame.
    pub fn to_sse_data(&self) -> String {
        match self {
            RelayFrame::Event(event) =>
                serde_json::to_string(event).unwrap_or_else(|e| {
                    format!(r#"{{"type":"error","value":"unencodable event: {}"}}"#, e)
                }),
            RelayFrame::Done => DONE_MARKER.to_string(),
        }
    }
}

pub type RelayStream = Pin<Box<dyn Stream<Item = RelayFrame> + Send>>;

#[derive(Debug, Error)]
enum RelayError {
    #[error("invalid conversation: {0}")]
    InvalidMessage(#[from] MessageError),
    #[error(transparent)]
    Upstream(#[from] LlmError),
    #[error("client disconnected")]
    Disconnected,
}

/// Puts `system_prompt` in front of the conversation unless it already opens
/// with a system message.
pub fn prepare_messages(system_prompt: &str, mut messages: Vec<Message>) -> Vec<Message> {
    let has_system = messages.first().is_some_and(Message::is_system);
    if !has_system {
        messages.insert(0, Message::system(system_prompt));
    }
    messages
}

pub struct Relay {
    client: Arc<dyn ChatClient>,
    config: Arc<RelayConfig>,
}

impl Relay {
    pub fn new(client: Arc<dyn ChatClient>, config: Arc<RelayConfig>) -> Self {
        Self { client, config }
    }

    /// Relays a conversation that has already been parsed.
    pub fn stream(&self, messages: Vec<Message>) -> RelayStream {
        self.spawn(Ok(messages))
    }

    /// Relays raw request entries; malformed ones are reported in-band.
    pub fn stream_raw(&self, raw: Vec<Value>) -> RelayStream {
        self.spawn(parse_messages(&raw))
    }

    fn spawn(&self, conversation: Result<Vec<Message>, MessageError>) -> RelayStream {
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let client = Arc::clone(&self.client);
        let config = Arc::clone(&self.config);

        tokio::spawn(async move {
            relay_conversation(client, config, conversation, tx).await;
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

async fn relay_conversation(
    client: Arc<dyn ChatClient>,
    config: Arc<RelayConfig>,
    conversation: Result<Vec<Message>, MessageError>,
    tx: mpsc::Sender<RelayFrame>
) {
    let stream_id = Uuid::new_v4();
    info!("[{}] relay started via {} ({})", stream_id, client.name(), client.get_model());

    match forward_fragments(stream_id, client.as_ref(), &config, conversation, &tx).await {
        Ok(count) => {
            info!("[{}] relay finished after {} fragments", stream_id, count);
        }
        Err(RelayError::Disconnected) => {
            info!("[{}] client disconnected, abandoning upstream stream", stream_id);
            return;
        }
        Err(e) => {
            error!("[{}] relay failed: {}", stream_id, e);
            let event = StreamEvent::Error(format!("{}: {}", ERROR_PREFIX, e));
            if tx.send(RelayFrame::Event(event)).await.is_err() {
                return;
            }
        }
    }

    let _ = tx.send(RelayFrame::Done).await;
}

async fn forward_fragments(
    stream_id: Uuid,
    client: &dyn ChatClient,
    config: &RelayConfig,
    conversation: Result<Vec<Message>, MessageError>,
    tx: &mpsc::Sender<RelayFrame>
) -> Result<usize, RelayError> {
    let messages = prepare_messages(&config.system_prompt, conversation?);
    debug!("[{}] forwarding {} messages upstream", stream_id, messages.len());

    let timeout = config.upstream_timeout;
    let mut fragments = within(timeout, client.stream_chat(&messages, &config.params)).await??;

    let mut count = 0usize;
    while let Some(item) = within(timeout, fragments.next()).await? {
        let fragment = item?;
        if fragment.is_empty() {
            continue;
        }

        tx.send(RelayFrame::Event(StreamEvent::Text(fragment))).await
            .map_err(|_| RelayError::Disconnected)?;
        count += 1;

        if !config.fragment_delay.is_zero() {
            tokio::time::sleep(config.fragment_delay).await;
        }
    }

    Ok(count)
}

/// Bounds a wait on the provider; a zero duration waits indefinitely.
async fn within<T>(limit: Duration, fut: impl Future<Output = T>) -> Result<T, LlmError> {
    if limit.is_zero() {
        return Ok(fut.await);
    }
    tokio::time::timeout(limit, fut).await.map_err(|_| LlmError::Timeout(limit))
}
