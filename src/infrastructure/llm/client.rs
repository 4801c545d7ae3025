//! # LLM Client
//!
//! Provides the `Client` struct, the entry point for LLM interactions.
//! It routes requests to the configured provider and adapts them to the domain `LlmProvider` trait.

use crate::domain::config::AgentConfig;
use crate::domain::traits::LlmProvider;
use crate::domain::types::CompletionRequest;
use crate::infrastructure::llm::providers;
use crate::infrastructure::llm::{Context, Error, Message, Provider, Response};
use async_trait::async_trait;

/// Simple LLM client
pub struct Client {
    agent_config: AgentConfig,
}

impl Client {
    /// Create a new client from the agent configuration
    pub fn new(agent_config: AgentConfig) -> Self {
        Self { agent_config }
    }

    /// Send a prepared context to the configured provider
    pub async fn chat(&self, context: Context) -> Result<Response, Error> {
        let provider_type = Provider::from_str(&self.agent_config.provider)
            .ok_or_else(|| Error::new(&self.agent_config.provider, "Unknown provider"))?;

        let provider_config = providers::ProviderConfig::from_agent_config(&self.agent_config)?;

        providers::chat(provider_type, provider_config, context).await
    }
}

/// Translate a domain completion request into an LLM context
pub fn build_context(request: CompletionRequest) -> Context {
    let mut user = Message::user(request.user_text);
    if let Some(url) = request.image_url {
        user = user.with_image(url);
    }

    let mut context = Context::new()
        .add_system_message(request.system)
        .add_message(user)
        .with_max_tokens(request.max_tokens);

    if let Some((name, schema)) = request.json_schema {
        context = context.with_json_schema(name, schema);
    }
    context
}

#[async_trait]
impl LlmProvider for Client {
    async fn completion(&self, request: CompletionRequest) -> anyhow::Result<Option<String>> {
        let response = self.chat(build_context(request)).await?;
        tracing::debug!(
            "Completion from {} used {} tokens ({} prompt, {} completion)",
            response.model,
            response.usage.total_tokens,
            response.usage.prompt_tokens,
            response.usage.completion_tokens
        );
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::llm::types::MessageRole;

    #[test]
    fn test_provider_from_str() {
        assert_eq!(Provider::from_str("openai"), Some(Provider::OpenAI));
        assert_eq!(Provider::from_str("OpenAI"), Some(Provider::OpenAI));
        assert_eq!(Provider::from_str("groq"), Some(Provider::Groq));
        assert_eq!(Provider::from_str("xai"), Some(Provider::XAI));
        assert_eq!(Provider::from_str("deepai"), Some(Provider::DeepAI));
        assert_eq!(Provider::from_str("deep_ai"), Some(Provider::DeepAI));
        assert_eq!(Provider::from_str("unknown"), None);
    }

    #[test]
    fn test_provider_as_str() {
        assert_eq!(Provider::OpenAI.as_str(), "openai");
        assert_eq!(Provider::Groq.as_str(), "groq");
        assert_eq!(Provider::XAI.as_str(), "xai");
        assert_eq!(Provider::DeepAI.as_str(), "deepai");
    }

    #[test]
    fn test_build_context_with_image_and_schema() {
        let context = build_context(CompletionRequest {
            system: "be brief".to_string(),
            user_text: "what is this?".to_string(),
            image_url: Some("https://cdn.example/img.jpg".to_string()),
            max_tokens: 300,
            json_schema: Some(("segments".to_string(), serde_json::json!({"type": "object"}))),
        });

        assert_eq!(context.messages.len(), 2);
        assert_eq!(context.messages[0].role, MessageRole::System);
        assert_eq!(context.messages[1].role, MessageRole::User);
        assert_eq!(
            context.messages[1].image_url.as_deref(),
            Some("https://cdn.example/img.jpg")
        );
        assert_eq!(context.max_tokens, Some(300));
        assert_eq!(context.json_schema.map(|s| s.name), Some("segments".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_rejected() {
        let client = Client::new(AgentConfig {
            provider: "carrier-pigeon".to_string(),
            api_key: "key".to_string(),
            ..AgentConfig::default()
        });
        let err = client.chat(Context::new()).await.unwrap_err();
        assert_eq!(err.provider, "carrier-pigeon");
        assert_eq!(err.message, "Unknown provider");
    }
}
