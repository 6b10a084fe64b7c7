pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;

use cli::Args;
use config::RelayConfig;
use llm::{ chat::new_client, LlmConfig };
use log::{ info, warn };
use relay::Relay;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let llm_config = LlmConfig::from_args(&args)?;
    let relay_config = RelayConfig::from_args(&args)?;

    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model);
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("(provider default)"));
    info!("API Key Set: {}", llm_config.api_key.is_some());
    info!("System Prompt: {}", args.system_prompt_path.as_deref().unwrap_or("(built-in)"));
    info!("Upstream Timeout: {:?}", relay_config.upstream_timeout);
    info!("Fragment Delay: {:?}", relay_config.fragment_delay);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    if llm_config.requires_api_key() && llm_config.api_key.is_none() {
        if args.require_api_key {
            return Err("GROQ_API_KEY is not set and --require-api-key is enabled".into());
        }
        warn!("GROQ_API_KEY is not set; every /chat request will report a provider error.");
    }

    let client = new_client(&llm_config)?;
    let relay = Arc::new(Relay::new(client, Arc::new(relay_config)));

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, relay, args);
    server.run().await?;

    Ok(())
}
