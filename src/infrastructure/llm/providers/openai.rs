//! OpenAI-compatible API provider
//!
//! Supports OpenAI, Groq, XAI, DeepAI and other OpenAI-compatible APIs

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::ProviderConfig;
use crate::infrastructure::llm::{Context, Error, Response, TokenUsage};

/// HTTP client reused across requests
fn http_client() -> &'static Client {
    use std::sync::OnceLock;
    static CLIENT: OnceLock<Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}

/// OpenAI API request format
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: OpenAIContent,
}

/// Plain text, or typed parts when an image is attached
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
}

#[derive(Debug, Serialize)]
struct OpenAIImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIResponseFormat {
    JsonSchema { json_schema: OpenAIJsonSchema },
}

#[derive(Debug, Serialize)]
struct OpenAIJsonSchema {
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: String,
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// The configured model, or `gpt-4o-mini` when none is set
fn request_model(config: &ProviderConfig) -> String {
    let model = config.default_model.trim();
    if model.is_empty() {
        "gpt-4o-mini".to_string()
    } else {
        model.to_string()
    }
}

fn build_request(model: String, context: Context) -> OpenAIRequest {
    OpenAIRequest {
        model,
        messages: context
            .messages
            .into_iter()
            .map(|msg| {
                let content = match msg.image_url {
                    Some(url) => OpenAIContent::Parts(vec![
                        OpenAIContentPart::Text { text: msg.content },
                        OpenAIContentPart::ImageUrl {
                            image_url: OpenAIImageUrl { url },
                        },
                    ]),
                    None => OpenAIContent::Text(msg.content),
                };
                OpenAIMessage {
                    role: msg.role.as_str().to_string(),
                    content,
                }
            })
            .collect(),
        max_tokens: context.max_tokens,
        response_format: context.json_schema.map(|schema| OpenAIResponseFormat::JsonSchema {
            json_schema: OpenAIJsonSchema {
                name: schema.name,
                schema: schema.schema,
                strict: true,
            },
        }),
    }
}

fn into_response(provider: &str, openai_response: OpenAIResponse) -> Result<Response, Error> {
    let choice = openai_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::new(provider, "No choices in response"))?;

    let usage = openai_response
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    Ok(Response {
        content: choice.message.content,
        model: openai_response.model,
        usage,
    })
}

/// Execute a chat request using OpenAI-compatible API
pub async fn chat(provider: &str, config: ProviderConfig, context: Context) -> Result<Response, Error> {
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
    let model = request_model(&config);

    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    let request = build_request(model, context);

    let mut request_builder = http_client()
        .post(&url)
        .header("Authorization", format!("Bearer {}", config.api_key))
        .header("Content-Type", "application/json")
        .json(&request);

    if let Some(timeout_secs) = config.timeout {
        request_builder = request_builder.timeout(std::time::Duration::from_secs(timeout_secs));
    }

    let response = request_builder
        .send()
        .await
        .map_err(|e| Error::new(provider, format!("HTTP request failed: {}", e)))?;

    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        // Try to parse error message from response
        if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(&error_text) {
            if let Some(error_msg) = error_json
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
            {
                return Err(Error::new(provider, error_msg));
            }
        }

        return Err(Error::new(
            provider,
            format!("HTTP {}: {}", status, error_text),
        ));
    }

    let openai_response: OpenAIResponse = response
        .json()
        .await
        .map_err(|e| Error::new(provider, format!("Failed to parse response: {}", e)))?;

    into_response(provider, openai_response)
}
