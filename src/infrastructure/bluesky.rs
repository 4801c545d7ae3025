//! # Bluesky Service Adapter
//!
//! Implements the `SocialClient` trait on top of `bsky-sdk`.
//! The session blob handed to the stores is the serialized agent [`Config`]
//! (endpoint and session tokens); nothing outside this module looks inside it.

use crate::domain::traits::SocialClient;
use crate::domain::types::{Notification, PostDraft, PostRef, SessionBlob, SourcePost};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use bsky_sdk::BskyAgent;
use bsky_sdk::agent::config::Config;
use bsky_sdk::api::app::bsky::feed::{get_posts, post};
use bsky_sdk::api::app::bsky::notification::list_notifications;
use bsky_sdk::api::app::bsky::richtext::facet;
use bsky_sdk::rich_text::RichText;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;

/// `app.bsky.feed.getPosts` accepts at most this many URIs per call
pub const GET_POSTS_BATCH: usize = 25;

const NOT_AUTHENTICATED: &str = "Not authenticated";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationView {
    uri: String,
    cid: String,
    reason: String,
    author: AuthorView,
    #[serde(default)]
    indexed_at: String,
}

#[derive(Debug, Deserialize)]
struct AuthorView {
    handle: String,
}

#[derive(Debug, Deserialize)]
struct ListNotificationsOutput {
    notifications: Vec<NotificationView>,
}

#[derive(Debug, Deserialize)]
struct PostView {
    uri: String,
    cid: String,
    record: Value,
    #[serde(default)]
    embed: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GetPostsOutput {
    posts: Vec<PostView>,
}

#[derive(Debug, Deserialize)]
struct CreateRecordOutput {
    uri: String,
    cid: String,
}

pub struct BlueskyClient {
    service: String,
    agent: RwLock<Option<BskyAgent>>,
}

impl BlueskyClient {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.trim_end_matches('/').to_string(),
            agent: RwLock::new(None),
        }
    }

    async fn build_agent(&self, config: Config) -> Result<BskyAgent> {
        BskyAgent::builder()
            .config(config)
            .build()
            .await
            .context("Failed to start Bluesky agent")
    }

    /// Makes `agent` the one used by every later call and returns its session blob
    async fn install(&self, agent: BskyAgent) -> Result<SessionBlob> {
        let blob = config_to_blob(&agent.to_config().await)?;
        *self.agent.write().await = Some(agent);
        Ok(blob)
    }
}

#[async_trait]
impl SocialClient for BlueskyClient {
    async fn login(&self, identifier: &str, password: &str) -> Result<SessionBlob> {
        let agent = self
            .build_agent(Config {
                endpoint: self.service.clone(),
                ..Config::default()
            })
            .await?;
        let session = agent
            .login(identifier, password)
            .await
            .context("createSession failed")?;

        tracing::debug!("Created session for {}", session.handle.as_str());
        self.install(agent).await
    }

    /// The agent verifies the cached tokens and refreshes them when the access token expired
    async fn resume(&self, blob: &SessionBlob) -> Result<SessionBlob> {
        let config = config_from_blob(blob)?;
        if config.session.is_none() {
            bail!("Cached agent config carries no session");
        }
        let agent = self.build_agent(config).await?;
        self.install(agent).await
    }

    async fn handle(&self) -> Result<String> {
        let guard = self.agent.read().await;
        let agent = guard.as_ref().ok_or_else(|| anyhow!(NOT_AUTHENTICATED))?;
        let session = agent
            .get_session()
            .await
            .ok_or_else(|| anyhow!(NOT_AUTHENTICATED))?;
        Ok(session.handle.as_str().to_string())
    }

    async fn list_notifications(&self, limit: u32) -> Result<Vec<Notification>> {
        let guard = self.agent.read().await;
        let agent = guard.as_ref().ok_or_else(|| anyhow!(NOT_AUTHENTICATED))?;

        let params: list_notifications::ParametersData =
            serde_json::from_value(json!({ "limit": limit.clamp(1, 100) }))
                .context("Invalid listNotifications parameters")?;
        let output = agent
            .api
            .app
            .bsky
            .notification
            .list_notifications(params.into())
            .await
            .context("listNotifications failed")?;
        let page: ListNotificationsOutput = from_wire(&output)?;

        Ok(page
            .notifications
            .into_iter()
            .map(|n| Notification {
                uri: n.uri,
                cid: n.cid,
                reason: n.reason,
                author_handle: n.author.handle,
                indexed_at: n.indexed_at,
            })
            .collect())
    }

    async fn get_posts(&self, uris: &[String]) -> Result<Vec<SourcePost>> {
        let guard = self.agent.read().await;
        let agent = guard.as_ref().ok_or_else(|| anyhow!(NOT_AUTHENTICATED))?;

        let batches = try_join_all(
            uris.chunks(GET_POSTS_BATCH)
                .map(|chunk| fetch_posts(agent, chunk)),
        )
        .await?;
        Ok(batches.into_iter().flatten().collect())
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<PostRef> {
        let guard = self.agent.read().await;
        let agent = guard.as_ref().ok_or_else(|| anyhow!(NOT_AUTHENTICATED))?;

        let record = post_record(draft, detect_facets(&draft.text).await)?;
        let output = agent
            .create_record(record)
            .await
            .context("createRecord failed")?;
        let created: CreateRecordOutput = from_wire(&output)?;
        Ok(PostRef {
            uri: created.uri,
            cid: created.cid,
        })
    }
}

async fn fetch_posts(agent: &BskyAgent, uris: &[String]) -> Result<Vec<SourcePost>> {
    let output = agent
        .api
        .app
        .bsky
        .feed
        .get_posts(
            get_posts::ParametersData {
                uris: uris.to_vec(),
            }
            .into(),
        )
        .await
        .context("getPosts failed")?;
    let page: GetPostsOutput = from_wire(&output)?;
    Ok(page.posts.into_iter().map(source_post).collect())
}

/// Reads an SDK output through its wire JSON
fn from_wire<T: DeserializeOwned>(output: &impl Serialize) -> Result<T> {
    let value = serde_json::to_value(output).context("Failed to serialize XRPC output")?;
    serde_json::from_value(value).context("Unexpected XRPC output shape")
}

fn config_to_blob(config: &Config) -> Result<SessionBlob> {
    Ok(SessionBlob(
        serde_json::to_value(config).context("Failed to serialize agent config")?,
    ))
}

fn config_from_blob(blob: &SessionBlob) -> Result<Config> {
    serde_json::from_value(blob.0.clone()).context("Cached session is not a Bluesky agent config")
}

/// Link, mention and tag facets as the SDK detects them. A failed detection posts plain text.
async fn detect_facets(text: &str) -> Option<Vec<facet::Main>> {
    match RichText::new_with_detect_facets(text).await {
        Ok(rich_text) => rich_text.facets,
        Err(e) => {
            tracing::warn!("Facet detection failed, posting without facets: {e}");
            None
        }
    }
}

fn source_post(view: PostView) -> SourcePost {
    let text = view
        .record
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    SourcePost {
        uri: view.uri,
        cid: view.cid,
        text,
        image_url: view.embed.as_ref().and_then(embed_image),
    }
}

/// Full-size URL of the first image attached to a post view embed
pub fn embed_image(embed: &Value) -> Option<String> {
    match embed.get("$type").and_then(Value::as_str)? {
        "app.bsky.embed.images#view" => embed
            .get("images")?
            .get(0)?
            .get("fullsize")?
            .as_str()
            .map(str::to_string),
        "app.bsky.embed.recordWithMedia#view" => embed_image(embed.get("media")?),
        _ => None,
    }
}

/// The `app.bsky.feed.post` record for a draft
pub fn post_record(draft: &PostDraft, facets: Option<Vec<facet::Main>>) -> Result<post::RecordData> {
    let mut wire = json!({
        "text": draft.text,
        "createdAt": draft.created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    });
    if let Some(reply) = &draft.reply {
        wire["reply"] = json!({
            "root": { "uri": reply.root.uri, "cid": reply.root.cid },
            "parent": { "uri": reply.parent.uri, "cid": reply.parent.cid },
        });
    }

    let mut record: post::RecordData =
        serde_json::from_value(wire).context("Draft is not a valid post record")?;
    record.facets = facets;
    Ok(record)
}
