//! Offline provider that answers from a fixed script.
//!
//! Lets the relay run end to end without a provider key: the reply is chosen
//! by keyword from the latest user message and streamed one character at a
//! time.

use async_trait::async_trait;

use super::{ create_streaming_response, ChatClient, FragmentStream };
use crate::config::GenerationParams;
use crate::llm::{ LlmConfig, LlmError };
use crate::models::chat::Message;

const PROVIDER: &str = "scripted";

const DOCTOR_REPLY: &str =
    "I'd be happy to help you book a doctor's appointment. Could you please provide the following details:\n\n1. What type of doctor do you need to see?\n2. What's your preferred date for the appointment?\n3. Do you have a preferred time of day?\n4. Do you have any specific doctor in mind?";
const PARK_REPLY: &str =
    "I'd be happy to help you book amusement park tickets. Could you please provide the following details:\n\n1. Which amusement park would you like to visit?\n2. What date are you planning to go?\n3. How many tickets do you need?\n4. Are you interested in any special passes or packages?";
const MOVIE_REPLY: &str =
    "I'd be happy to help you book movie tickets. Could you please provide the following details:\n\n1. Which movie would you like to see?\n2. What date would you like to go?\n3. Do you have a preferred time?\n4. How many tickets do you need?\n5. Do you have a preferred cinema location?";
const CONCERT_REPLY: &str =
    "I'd be happy to help you book concert tickets. Could you please provide the following details:\n\n1. Which artist or concert are you interested in?\n2. Do you know the date of the concert?\n3. How many tickets would you like to purchase?\n4. Do you have any seating preferences?";
const BOOKING_REPLY: &str =
    "I'd be happy to help you with your booking. Could you please specify what type of booking you're interested in? I can help with doctor appointments, amusement park tickets, movie tickets, concert tickets, and more.";
const GREETING_REPLY: &str =
    "Hello! I'm your ticket booking assistant. I can help you book tickets for various events and services including:\n\n- Doctor appointments\n- Amusement park tickets\n- Movie tickets\n- Concert tickets\n- Sports events\n\nWhat type of booking would you like to make today?";

// first match wins
const SCRIPT: &[(&[&str], &str)] = &[
    (&["doctor", "appointment"], DOCTOR_REPLY),
    (&["amusement", "park"], PARK_REPLY),
    (&["movie", "cinema"], MOVIE_REPLY),
    (&["concert"], CONCERT_REPLY),
    (&["book"], BOOKING_REPLY),
];

pub struct ScriptedChatClient {
    model: String,
}

impl ScriptedChatClient {
    pub fn new() -> Self {
        Self { model: PROVIDER.to_string() }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            model: config.completion_model.clone().unwrap_or_else(|| PROVIDER.to_string()),
        }
    }

    pub fn reply_for(messages: &[Message]) -> &'static str {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.to_lowercase())
            .unwrap_or_default();

        SCRIPT.iter()
            .find(|(keywords, _)| keywords.iter().any(|k| last_user.contains(k)))
            .map(|(_, reply)| *reply)
            .unwrap_or(GREETING_REPLY)
    }
}

impl Default for ScriptedChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn stream_chat(
        &self,
        messages: &[Message],
        _params: &GenerationParams
    ) -> Result<FragmentStream, LlmError> {
        let reply = Self::reply_for(messages);

        Ok(
            create_streaming_response(move |tx| async move {
                for ch in reply.chars() {
                    if tx.send(Ok(ch.to_string())).await.is_err() {
                        return;
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
