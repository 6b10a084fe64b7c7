pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::cli::Args;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Groq,
    Scripted,
}

#[derive(Debug, PartialEq, Eq, Error)]
#[error("Invalid LLM type: '{0}'")]
pub struct ParseLlmTypeError(String);

impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(LlmType::Groq),
            "scripted" | "offline" => Ok(LlmType::Scripted),
            _ => Err(ParseLlmTypeError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Groq,
            api_key: None,
            completion_model: None,
            base_url: None,
        }
    }
}

impl LlmConfig {
    pub fn from_args(args: &Args) -> Result<Self, ParseLlmTypeError> {
        let api_key = Some(args.groq_api_key.trim().to_string()).filter(|k| !k.is_empty());
        Ok(Self {
            llm_type: args.chat_llm_type.parse()?,
            api_key,
            completion_model: Some(args.chat_model.clone()),
            base_url: args.chat_base_url.clone(),
        })
    }

    /// Whether this provider needs a credential to serve requests.
    pub fn requires_api_key(&self) -> bool {
        matches!(self.llm_type, LlmType::Groq)
    }
}

/// Faults raised by chat providers, either while opening a stream or mid-stream.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} API key is not configured")]
    MissingApiKey { provider: &'static str },
    #[error("request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} API returned {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed response from {provider}: {detail}")]
    Malformed { provider: &'static str, detail: String },
    #[error("no response from upstream within {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Other(String),
}
