pub mod groq;
pub mod scripted;

use async_trait::async_trait;
use futures::{ Future, Stream };
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmError, LlmType };
use self::groq::GroqChatClient;
use self::scripted::ScriptedChatClient;
use crate::config::GenerationParams;
use crate::models::chat::Message;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Incremental text fragments in the order the provider produced them.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

pub type FragmentSender = mpsc::Sender<Result<String, LlmError>>;

const FRAGMENT_CHANNEL_CAPACITY: usize = 32;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Opens a streaming completion for `messages`.
    ///
    /// Faults raised before the provider accepted the request are returned as
    /// `Err`; faults after that arrive as `Err` items of the stream.
    async fn stream_chat(
        &self,
        messages: &[Message],
        params: &GenerationParams
    ) -> Result<FragmentStream, LlmError>;

    fn name(&self) -> &'static str;

    fn get_model(&self) -> String;
}

/// Runs `producer` on its own task and exposes what it sends as a stream.
///
/// The producer should stop once a send fails: that means the consumer is gone.
pub fn create_streaming_response<F, Fut>(producer: F) -> FragmentStream
    where F: FnOnce(FragmentSender) -> Fut + Send + 'static, Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        producer(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Groq => {
            let specific_client = GroqChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Scripted => {
            let specific_client = ScriptedChatClient::from_config(config);
            Arc::new(specific_client)
        }
    };
    Ok(client)
}
