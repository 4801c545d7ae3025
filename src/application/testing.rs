//! In-memory collaborators for pipeline tests.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::traits::{ContentGenerator, ReplyStore, SessionStore, SocialClient};
use crate::domain::types::{
    Notification, PostDraft, PostRef, RecordOutcome, ReplyRecord, SessionBlob, SessionRecord,
    SourcePost,
};

/// Handle of the account the fake social client is logged in as
pub const BOT_HANDLE: &str = "helper.bsky.social";

pub fn notification(uri: &str, reason: &str) -> Notification {
    Notification {
        uri: uri.to_string(),
        cid: format!("cid-{uri}"),
        reason: reason.to_string(),
        author_handle: "alice.bsky.social".to_string(),
        indexed_at: "2024-05-01T12:00:00.000Z".to_string(),
    }
}

pub fn source_post(uri: &str, text: &str) -> SourcePost {
    SourcePost {
        uri: uri.to_string(),
        cid: format!("cid-{uri}"),
        text: text.to_string(),
        image_url: None,
    }
}

/// Social network double: serves fixed notifications and posts, records published drafts
#[derive(Default)]
pub struct FakeSocial {
    pub notifications: Vec<Notification>,
    pub posts: HashMap<String, SourcePost>,
    pub published: Mutex<Vec<PostDraft>>,
    pub login_calls: AtomicUsize,
    pub resume_calls: AtomicUsize,
    pub fail_login: bool,
    pub fail_resume: bool,
    pub fail_notifications: bool,
    /// Fail the n-th publish call (0-based)
    pub fail_publish_at: Option<usize>,
    pub publish_attempts: AtomicUsize,
}

impl FakeSocial {
    pub fn with_mentions(posts: Vec<SourcePost>) -> Self {
        Self {
            notifications: posts.iter().map(|p| notification(&p.uri, "mention")).collect(),
            posts: posts.into_iter().map(|p| (p.uri.clone(), p)).collect(),
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<PostDraft> {
        self.published.lock().unwrap().clone()
    }

    pub fn logins(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }
}

pub fn published_ref(index: usize) -> PostRef {
    PostRef {
        uri: format!("at://did:plc:bot/app.bsky.feed.post/{index}"),
        cid: format!("bafy-{index}"),
    }
}

#[async_trait]
impl SocialClient for FakeSocial {
    async fn login(&self, identifier: &str, _password: &str) -> Result<SessionBlob> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_login {
            bail!("Invalid identifier or password");
        }
        Ok(SessionBlob(json!({ "identifier": identifier, "token": "fresh" })))
    }

    async fn resume(&self, session: &SessionBlob) -> Result<SessionBlob> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_resume {
            bail!("Token has expired");
        }
        Ok(session.clone())
    }

    async fn handle(&self) -> Result<String> {
        Ok(BOT_HANDLE.to_string())
    }

    async fn list_notifications(&self, _limit: u32) -> Result<Vec<Notification>> {
        if self.fail_notifications {
            bail!("listNotifications failed (HTTP 502)");
        }
        Ok(self.notifications.clone())
    }

    async fn get_posts(&self, uris: &[String]) -> Result<Vec<SourcePost>> {
        Ok(uris
            .iter()
            .filter_map(|uri| self.posts.get(uri).cloned())
            .collect())
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<PostRef> {
        let attempt = self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_publish_at == Some(attempt) {
            bail!("createRecord failed (HTTP 500)");
        }
        let mut published = self.published.lock().unwrap();
        published.push(draft.clone());
        Ok(published_ref(published.len()))
    }
}

/// Dedup table double with the (uri, bot_name) uniqueness constraint
#[derive(Default)]
pub struct MemoryReplyStore {
    pub rows: Mutex<HashSet<ReplyRecord>>,
    /// Listing every replied URI fails
    pub fail_reads: bool,
    /// Single-URI lookups fail
    pub fail_lookups: bool,
    pub fail_writes: bool,
}

impl MemoryReplyStore {
    pub fn seeded(bot_name: &str, uris: &[&str]) -> Self {
        let rows = uris
            .iter()
            .map(|uri| ReplyRecord {
                bot_name: bot_name.to_string(),
                uri: uri.to_string(),
            })
            .collect();
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn contains(&self, bot_name: &str, uri: &str) -> bool {
        self.rows.lock().unwrap().contains(&ReplyRecord {
            bot_name: bot_name.to_string(),
            uri: uri.to_string(),
        })
    }
}

#[async_trait]
impl ReplyStore for MemoryReplyStore {
    async fn replied_uris(&self, bot_name: &str) -> Result<HashSet<String>> {
        if self.fail_reads {
            return Err(anyhow!("connection reset"));
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.bot_name == bot_name)
            .map(|r| r.uri.clone())
            .collect())
    }

    async fn is_replied(&self, bot_name: &str, uri: &str) -> Result<bool> {
        if self.fail_lookups {
            bail!("connection reset");
        }
        Ok(self.contains(bot_name, uri))
    }

    async fn record_reply(&self, record: &ReplyRecord) -> Result<RecordOutcome> {
        if self.fail_writes {
            return Err(anyhow!("connection reset"));
        }
        if self.rows.lock().unwrap().insert(record.clone()) {
            Ok(RecordOutcome::Recorded)
        } else {
            Ok(RecordOutcome::AlreadyRecorded)
        }
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    pub rows: Mutex<HashMap<String, SessionRecord>>,
    pub fail_reads: bool,
}

impl MemorySessionStore {
    pub fn seeded(bot_name: &str, session: SessionBlob) -> Self {
        let store = Self::default();
        store
            .rows
            .lock()
            .unwrap()
            .insert(bot_name.to_string(), SessionRecord::new(bot_name, session));
        store
    }

    pub fn get(&self, bot_name: &str) -> Option<SessionRecord> {
        self.rows.lock().unwrap().get(bot_name).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_session(&self, bot_name: &str) -> Result<Option<SessionRecord>> {
        if self.fail_reads {
            bail!("connection reset");
        }
        Ok(self.get(bot_name))
    }

    async fn save_session(&self, record: &SessionRecord) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert(record.bot_name.clone(), record.clone());
        Ok(())
    }
}

/// Generator double with a canned reply and canned split
pub struct FakeGenerator {
    pub reply: Result<String, String>,
    pub split: Result<Vec<String>, String>,
    /// (source text, image URL, mention token) of every call
    pub generate_calls: Mutex<Vec<(String, Option<String>, String)>>,
    pub split_calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            split: Err("split not expected".to_string()),
            generate_calls: Mutex::new(Vec::new()),
            split_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_split(mut self, parts: &[&str]) -> Self {
        self.split = Ok(parts.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn with_split_error(mut self, message: &str) -> Self {
        self.split = Err(message.to_string());
        self
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            ..Self::replying("")
        }
    }

    pub fn generate_calls(&self) -> Vec<(String, Option<String>, String)> {
        self.generate_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn generate_reply(
        &self,
        source_text: &str,
        image_url: Option<&str>,
        mention_token: &str,
    ) -> Result<String> {
        self.generate_calls.lock().unwrap().push((
            source_text.to_string(),
            image_url.map(str::to_string),
            mention_token.to_string(),
        ));
        self.reply.clone().map_err(|e| anyhow!(e))
    }

    async fn split_into_segments(&self, _text: &str) -> Result<Vec<String>> {
        self.split_calls.fetch_add(1, Ordering::SeqCst);
        self.split.clone().map_err(|e| anyhow!(e))
    }
}
