//! # Domain Traits
//!
//! Abstract interfaces for the collaborators of the reply pipeline (social network,
//! stores, content generation). Concrete implementations live in the Infrastructure layer.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use crate::domain::types::{
    CompletionRequest, Notification, PostDraft, PostRef, RecordOutcome, ReplyRecord,
    SessionBlob, SessionRecord, SourcePost,
};

/// Abstract interface for the social network account the bot posts as
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Full credential login. Returns the new session.
    async fn login(&self, identifier: &str, password: &str) -> Result<SessionBlob>;

    /// Resume a cached session. Returns the session now in use (refreshed if it had expired).
    async fn resume(&self, session: &SessionBlob) -> Result<SessionBlob>;

    /// Handle of the authenticated account
    async fn handle(&self) -> Result<String>;

    /// Latest notifications, newest first
    async fn list_notifications(&self, limit: u32) -> Result<Vec<Notification>>;

    /// Resolve posts by URI. Posts that no longer exist are absent from the result.
    async fn get_posts(&self, uris: &[String]) -> Result<Vec<SourcePost>>;

    /// Publish a post and return its reference
    async fn create_post(&self, draft: &PostDraft) -> Result<PostRef>;
}

/// Persisted set of posts already answered, keyed by bot identity
#[async_trait]
pub trait ReplyStore: Send + Sync {
    async fn replied_uris(&self, bot_name: &str) -> Result<HashSet<String>>;

    /// Whether `uri` already has a reply from `bot_name`
    async fn is_replied(&self, bot_name: &str, uri: &str) -> Result<bool>;

    async fn record_reply(&self, record: &ReplyRecord) -> Result<RecordOutcome>;
}

/// Persisted authentication session, one per bot identity
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, bot_name: &str) -> Result<Option<SessionRecord>>;

    /// Insert or replace the session for `record.bot_name`
    async fn save_session(&self, record: &SessionRecord) -> Result<()>;
}

/// Produces reply text
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Answer a mention. `mention_token` is the bot's own `@handle`, removed from the question.
    async fn generate_reply(
        &self,
        source_text: &str,
        image_url: Option<&str>,
        mention_token: &str,
    ) -> Result<String>;

    /// Split an over-long reply into ordered thread segments
    async fn split_into_segments(&self, text: &str) -> Result<Vec<String>>;
}

/// Abstract interface for an LLM Provider
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion. `None` when the model returned no text.
    async fn completion(&self, request: CompletionRequest) -> Result<Option<String>>;
}
