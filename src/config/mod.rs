pub mod prompt;

use crate::cli::Args;
use serde::Serialize;
use std::time::Duration;

use self::prompt::{ load_system_prompt, PromptError };

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            top_p: 1.0,
        }
    }
}

/// Process-wide relay settings, built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub system_prompt: String,
    pub params: GenerationParams,
    pub upstream_timeout: Duration,
    pub fragment_delay: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            system_prompt: prompt::DEFAULT_SYSTEM_PROMPT.to_string(),
            params: GenerationParams::default(),
            upstream_timeout: Duration::from_secs(60),
            fragment_delay: Duration::from_millis(10),
        }
    }
}

impl RelayConfig {
    pub fn from_args(args: &Args) -> Result<Self, PromptError> {
        Ok(Self {
            system_prompt: load_system_prompt(args.system_prompt_path.as_deref())?,
            params: GenerationParams::default(),
            upstream_timeout: Duration::from_secs(args.upstream_timeout_secs),
            fragment_delay: Duration::from_millis(args.fragment_delay_ms),
        })
    }
}
