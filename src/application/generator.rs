//! # Reply Generator
//!
//! Implements `ContentGenerator` on top of an `LlmProvider`: answers a mention in a
//! single short reply, and splits over-long replies into thread segments using
//! structured output.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::application::utils::char_len;
use crate::domain::traits::{ContentGenerator, LlmProvider};
use crate::domain::types::CompletionRequest;
use crate::strings::prompts;

/// Length the model is asked to stay under
pub const REPLY_CHAR_TARGET: usize = 250;
/// Posted in place of an empty answer
pub const FALLBACK_REPLY: &str = ":(";
pub const MAX_SEGMENTS: usize = 3;
pub const SEGMENT_CHAR_TARGET: usize = 200;
/// Hard cap per segment; anything longer cannot be posted
pub const SEGMENT_CHAR_LIMIT: usize = 300;

const SPLIT_SCHEMA_NAME: &str = "thread_segments";
const SPLIT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Deserialize)]
struct SplitOutput {
    parts: Vec<String>,
}

pub struct ReplyGenerator {
    llm: Arc<dyn LlmProvider>,
    max_tokens: u32,
}

impl ReplyGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, max_tokens: u32) -> Self {
        Self { llm, max_tokens }
    }
}

/// The handle as it appears in post text, e.g. `@bot.bsky.social`
pub fn mention_token(handle: &str) -> String {
    format!("@{}", handle.trim_start_matches('@'))
}

/// Removes the bot's own handle so the model only sees the question
pub fn strip_mention(text: &str, mention_token: &str) -> String {
    if mention_token.is_empty() {
        return text.trim().to_string();
    }
    text.replace(mention_token, "").trim().to_string()
}

pub fn split_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "parts": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["parts"],
        "additionalProperties": false
    })
}

/// Validates the structured split. Blank parts are dropped; an empty result is allowed.
pub fn parse_segments(raw: &str) -> Result<Vec<String>> {
    let output: SplitOutput =
        serde_json::from_str(raw.trim()).context("Split output is not a valid segments object")?;

    let parts: Vec<String> = output
        .parts
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();

    if parts.len() > MAX_SEGMENTS {
        bail!(
            "Split returned {} parts, at most {} allowed",
            parts.len(),
            MAX_SEGMENTS
        );
    }
    if let Some(part) = parts.iter().find(|p| char_len(p) > SEGMENT_CHAR_LIMIT) {
        bail!(
            "Split returned a part of {} characters, at most {} allowed",
            char_len(part),
            SEGMENT_CHAR_LIMIT
        );
    }
    Ok(parts)
}

#[async_trait]
impl ContentGenerator for ReplyGenerator {
    async fn generate_reply(
        &self,
        source_text: &str,
        image_url: Option<&str>,
        mention_token: &str,
    ) -> Result<String> {
        let request = CompletionRequest {
            system: prompts::reply_system_prompt(REPLY_CHAR_TARGET),
            user_text: strip_mention(source_text, mention_token),
            image_url: image_url.map(str::to_string),
            max_tokens: self.max_tokens,
            json_schema: None,
        };

        let content = self.llm.completion(request).await?;
        Ok(match content {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => FALLBACK_REPLY.to_string(),
        })
    }

    async fn split_into_segments(&self, text: &str) -> Result<Vec<String>> {
        let request = CompletionRequest {
            system: prompts::split_system_prompt(MAX_SEGMENTS, SEGMENT_CHAR_TARGET),
            user_text: text.to_string(),
            image_url: None,
            max_tokens: SPLIT_MAX_TOKENS,
            json_schema: Some((SPLIT_SCHEMA_NAME.to_string(), split_schema())),
        };

        let raw = self
            .llm
            .completion(request)
            .await?
            .ok_or_else(|| anyhow!("Split returned no content"))?;
        parse_segments(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const TOKEN: &str = "@helper.bsky.social";

    /// Records every request and answers with a canned completion
    struct ScriptedLlm {
        answer: Option<String>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn answering(answer: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.map(str::to_string),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> CompletionRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn completion(&self, request: CompletionRequest) -> Result<Option<String>> {
            self.requests.lock().unwrap().push(request);
            Ok(self.answer.clone())
        }
    }

    #[test]
    fn test_mention_token_from_handle() {
        assert_eq!(mention_token("helper.bsky.social"), TOKEN);
        assert_eq!(mention_token("@helper.bsky.social"), TOKEN);
    }

    #[test]
    fn test_strip_mention() {
        assert_eq!(
            strip_mention("@helper.bsky.social how do I sort?", "@helper.bsky.social"),
            "how do I sort?"
        );
        assert_eq!(strip_mention("  plain  ", ""), "plain");
        assert_eq!(strip_mention("no handle here", "@helper.bsky.social"), "no handle here");
    }

    #[tokio::test]
    async fn test_generate_reply_strips_handle_and_sends_text_only() {
        let llm = ScriptedLlm::answering(Some("Use merge sort."));
        let generator = ReplyGenerator::new(llm.clone(), 300);

        let reply = generator
            .generate_reply("@helper.bsky.social how do I sort an array?", None, TOKEN)
            .await
            .unwrap();

        assert_eq!(reply, "Use merge sort.");
        let request = llm.last_request();
        assert_eq!(request.user_text, "how do I sort an array?");
        assert_eq!(request.image_url, None);
        assert_eq!(request.max_tokens, 300);
        assert!(request.json_schema.is_none());
        assert!(request.system.contains("250"));
    }

    #[tokio::test]
    async fn test_generate_reply_passes_image() {
        let llm = ScriptedLlm::answering(Some("That is a segfault."));
        let generator = ReplyGenerator::new(llm.clone(), 300);

        generator
            .generate_reply("what is this error?", Some("https://cdn/full/1"), TOKEN)
            .await
            .unwrap();

        assert_eq!(llm.last_request().image_url.as_deref(), Some("https://cdn/full/1"));
    }

    #[tokio::test]
    async fn test_empty_completion_falls_back() {
        for answer in [None, Some("   ")] {
            let generator = ReplyGenerator::new(ScriptedLlm::answering(answer), 300);
            let reply = generator.generate_reply("hi", None, TOKEN).await.unwrap();
            assert_eq!(reply, FALLBACK_REPLY);
        }
    }

    #[tokio::test]
    async fn test_split_requests_structured_output() {
        let llm = ScriptedLlm::answering(Some(r#"{"parts": ["one", "two"]}"#));
        let generator = ReplyGenerator::new(llm.clone(), 300);

        let parts = generator.split_into_segments("long text").await.unwrap();

        assert_eq!(parts, vec!["one".to_string(), "two".to_string()]);
        let request = llm.last_request();
        assert_eq!(request.user_text, "long text");
        let (name, schema) = request.json_schema.unwrap();
        assert_eq!(name, "thread_segments");
        assert_eq!(schema["required"], json!(["parts"]));
    }

    #[tokio::test]
    async fn test_split_without_content_is_an_error() {
        let generator = ReplyGenerator::new(ScriptedLlm::answering(None), 300);
        assert!(generator.split_into_segments("long text").await.is_err());
    }

    #[test]
    fn test_parse_segments_rejects_malformed_output() {
        assert!(parse_segments("not json").is_err());
        assert!(parse_segments(r#"{"segments": ["a"]}"#).is_err());
        assert!(parse_segments(r#"{"parts": "a"}"#).is_err());
    }

    #[test]
    fn test_parse_segments_drops_blank_parts() {
        assert_eq!(
            parse_segments(r#"{"parts": [" a ", "", "  "]}"#).unwrap(),
            vec!["a".to_string()]
        );
        assert!(parse_segments(r#"{"parts": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_segments_enforces_limits() {
        assert!(parse_segments(r#"{"parts": ["a", "b", "c", "d"]}"#).is_err());

        let long = "x".repeat(SEGMENT_CHAR_LIMIT + 1);
        let raw = json!({ "parts": [long] }).to_string();
        assert!(parse_segments(&raw).is_err());
    }
}
