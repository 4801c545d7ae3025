//! # LLM Providers
//!
//! Every supported provider exposes an OpenAI-compatible chat completions API,
//! so they share one implementation and differ only by base URL.

mod openai;

use crate::domain::config::AgentConfig;
use crate::infrastructure::llm::{Context, Error, Provider, Response};

/// Configuration for a provider
#[derive(Clone)]
pub struct ProviderConfig {
    /// API key
    pub api_key: String,
    /// Base URL (for non-default endpoints)
    pub base_url: Option<String>,
    /// Default model
    pub default_model: String,
    /// Timeout in seconds
    pub timeout: Option<u64>,
}

impl ProviderConfig {
    pub fn from_agent_config(config: &AgentConfig) -> Result<Self, Error> {
        if config.api_key.trim().is_empty() {
            return Err(Error::new(&config.provider, "No API key provided"));
        }

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.endpoint.clone(),
            default_model: config.model.clone(),
            timeout: config.timeout,
        })
    }
}

/// Execute a chat request with the specified provider
pub async fn chat(
    provider: Provider,
    config: ProviderConfig,
    context: Context,
) -> Result<Response, Error> {
    let config = ProviderConfig {
        base_url: Some(
            config
                .base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string()),
        ),
        ..config
    };
    openai::chat(provider.as_str(), config, context).await
}
