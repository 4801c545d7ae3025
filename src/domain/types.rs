//! # Domain Types
//!
//! Data exchanged between the reply pipeline and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification reason that puts a notification in scope.
pub const MENTION_REASON: &str = "mention";

/// A single entry of the bot's notification feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub uri: String,
    pub cid: String,
    pub reason: String,
    pub author_handle: String,
    pub indexed_at: String,
}

impl Notification {
    pub fn is_mention(&self) -> bool {
        self.reason == MENTION_REASON
    }
}

/// Strong reference to a published post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

/// Thread linkage of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: PostRef,
    pub parent: PostRef,
}

/// The mentioning post, resolved from a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePost {
    pub uri: String,
    pub cid: String,
    pub text: String,
    pub image_url: Option<String>,
}

impl SourcePost {
    pub fn post_ref(&self) -> PostRef {
        PostRef {
            uri: self.uri.clone(),
            cid: self.cid.clone(),
        }
    }
}

/// A post about to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub text: String,
    pub reply: Option<ReplyRef>,
    pub created_at: DateTime<Utc>,
}

impl PostDraft {
    pub fn reply(text: impl Into<String>, root: &PostRef, parent: &PostRef) -> Self {
        Self {
            text: text.into(),
            reply: Some(ReplyRef {
                root: root.clone(),
                parent: parent.clone(),
            }),
            created_at: Utc::now(),
        }
    }
}

/// Reply text shaped for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedReply {
    Single(String),
    Thread(Vec<String>),
}

impl GeneratedReply {
    pub fn segments(&self) -> &[String] {
        match self {
            GeneratedReply::Single(text) => std::slice::from_ref(text),
            GeneratedReply::Thread(parts) => parts,
        }
    }
}

/// "This bot has already replied to `uri`."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub bot_name: String,
    pub uri: String,
}

/// Result of inserting a [`ReplyRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// The uniqueness constraint rejected the insert.
    AlreadyRecorded,
}

/// Opaque serialized credential bundle. Only the social client reads its contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionBlob(pub serde_json::Value);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub bot_name: String,
    pub session: SessionBlob,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(bot_name: impl Into<String>, session: SessionBlob) -> Self {
        Self {
            bot_name: bot_name.into(),
            session,
            updated_at: Utc::now(),
        }
    }
}

/// Login credentials for the bot account.
#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"***")
            .finish()
    }
}

/// A chat completion request as the content generator phrases it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user_text: String,
    pub image_url: Option<String>,
    pub max_tokens: u32,
    /// Name and JSON schema the answer must conform to
    pub json_schema: Option<(String, serde_json::Value)>,
}
