use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:8000")]
    pub server_addr: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (groq, scripted)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "groq")]
    pub chat_llm_type: String,

    /// API Key for the Groq provider.
    #[arg(long, env = "GROQ_API_KEY", default_value = "", hide_env_values = true)]
    pub groq_api_key: String,

    /// Model name for chat completion.
    #[arg(long, env = "CHAT_MODEL", default_value = "llama-3.3-70b-versatile")]
    pub chat_model: String,

    /// Base URL for the chat provider API. The adapter default is used when unset.
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: Option<String>,

    /// Refuse to start when the provider API key is missing instead of failing every request.
    #[arg(long, env = "REQUIRE_API_KEY", default_value = "false")]
    pub require_api_key: bool,

    // --- Relay Args ---
    /// Optional path to a text file replacing the built-in system instruction.
    #[arg(long, env = "SYSTEM_PROMPT_PATH")]
    pub system_prompt_path: Option<String>,

    /// Seconds to wait for the upstream provider to respond or emit the next fragment (0 disables).
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "60")]
    pub upstream_timeout_secs: u64,

    /// Pause between relayed fragments in milliseconds (0 disables).
    #[arg(long, env = "FRAGMENT_DELAY_MS", default_value = "10")]
    pub fragment_delay_ms: u64,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
