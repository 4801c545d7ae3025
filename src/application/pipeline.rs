//! # Reply Pipeline
//!
//! One run of the bot: authenticate, collect unanswered mentions, and answer each of
//! them in its own task. Tasks run on a bounded pool and the run waits for all of them.
//! A mention is only recorded as answered once every post of its reply is published.
//! When the replied set could not be read up front, each mention is looked up again
//! right before anything is published for it.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::application::auth::authenticate;
use crate::application::generator::mention_token;
use crate::application::mentions::{get_mentions, resolve_posts};
use crate::application::publisher::{PublishOutcome, publish_reply};
use crate::application::utils::bounded;
use crate::domain::config::AppConfig;
use crate::domain::traits::{ContentGenerator, ReplyStore, SessionStore, SocialClient};
use crate::domain::types::{Credentials, RecordOutcome, ReplyRecord, SourcePost};
use crate::strings::logs;

/// Collaborators, constructed once at startup
#[derive(Clone)]
pub struct Deps {
    pub social: Arc<dyn SocialClient>,
    pub replies: Arc<dyn ReplyStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub generator: Arc<dyn ContentGenerator>,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub bot_name: String,
    pub concurrency: usize,
    pub call_timeout: Duration,
    pub notification_limit: u32,
    pub dedup_fail_open: bool,
}

impl RunSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            bot_name: config.bot.name.clone(),
            concurrency: config.system.concurrency.max(1),
            call_timeout: Duration::from_secs(config.system.call_timeout_secs.max(1)),
            notification_limit: config.system.notification_limit,
            dedup_fail_open: config.system.dedup_fail_open,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionOutcome {
    Replied { posts: usize },
    /// Claimed by another task this run, or recorded by another run
    AlreadyHandled,
    /// Left for the next run
    EmptySplit,
    Failed,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mentions: usize,
    pub replied: usize,
    pub posts_published: usize,
    pub already_handled: usize,
    pub empty_split: usize,
    /// Mentions whose post could not be resolved
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &MentionOutcome) {
        match outcome {
            MentionOutcome::Replied { posts } => {
                self.replied += 1;
                self.posts_published += posts;
            }
            MentionOutcome::AlreadyHandled => self.already_handled += 1,
            MentionOutcome::EmptySplit => self.empty_split += 1,
            MentionOutcome::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mention(s): {} replied ({} post(s)), {} already handled, {} left for retry, {} skipped, {} failed",
            self.mentions,
            self.replied,
            self.posts_published,
            self.already_handled,
            self.empty_split,
            self.skipped,
            self.failed
        )
    }
}

/// Facts established once per run and shared by every mention task
struct RunContext {
    mention_token: String,
    /// The replied set was not read; look each mention up before publishing
    recheck_replied: bool,
}

pub struct ReplyPipeline {
    deps: Deps,
    settings: RunSettings,
    /// URIs a task of this run is already working on
    claims: Mutex<HashSet<String>>,
}

impl ReplyPipeline {
    pub fn new(deps: Deps, settings: RunSettings) -> Arc<Self> {
        Arc::new(Self {
            deps,
            settings,
            claims: Mutex::new(HashSet::new()),
        })
    }

    /// Runs the whole pipeline once. Fails only when authentication or mention
    /// collection fails; per-mention failures are reported in the summary.
    pub async fn run(self: &Arc<Self>, credentials: &Credentials) -> Result<RunSummary> {
        let timeout = self.settings.call_timeout;

        let handle = authenticate(
            self.deps.social.as_ref(),
            self.deps.sessions.as_ref(),
            &self.settings.bot_name,
            credentials,
            timeout,
        )
        .await
        .context("Authentication failed")?;

        let batch = get_mentions(
            self.deps.social.as_ref(),
            self.deps.replies.as_ref(),
            &self.settings.bot_name,
            self.settings.notification_limit,
            self.settings.dedup_fail_open,
            timeout,
        )
        .await?;

        if batch.mentions.is_empty() {
            tracing::info!("{}", logs::NO_MENTIONS);
            return Ok(RunSummary::default());
        }
        tracing::info!("{}", logs::mentions_found(batch.mentions.len()));

        let posts = resolve_posts(self.deps.social.as_ref(), &batch.mentions, timeout).await?;
        let unresolved = batch.mentions.len().saturating_sub(posts.len());

        let run = Arc::new(RunContext {
            mention_token: mention_token(&handle),
            recheck_replied: !batch.deduplicated,
        });
        let mut summary = self.answer_all(posts, run).await;
        summary.skipped = unresolved;
        summary.mentions = batch.mentions.len();
        Ok(summary)
    }

    async fn answer_all(
        self: &Arc<Self>,
        posts: Vec<SourcePost>,
        run: Arc<RunContext>,
    ) -> RunSummary {
        let permits = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for post in posts {
            let pipeline = Arc::clone(self);
            let permits = Arc::clone(&permits);
            let run = Arc::clone(&run);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                pipeline.answer_mention(post, &run).await
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    tracing::error!("{}", logs::task_panicked(&e.to_string()));
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Generate, publish and record the reply to one mention
    async fn answer_mention(&self, post: SourcePost, run: &RunContext) -> MentionOutcome {
        if !self.claims.lock().await.insert(post.uri.clone()) {
            return MentionOutcome::AlreadyHandled;
        }

        match self.reply_to(&post, run).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("{}", logs::mention_failed(&post.uri, &format!("{e:#}")));
                MentionOutcome::Failed
            }
        }
    }

    /// Lookup for a fail-open run. A failed lookup lets the mention through.
    async fn already_replied(&self, uri: &str) -> bool {
        let lookup = self.deps.replies.is_replied(&self.settings.bot_name, uri);
        match bounded(self.settings.call_timeout, "look up reply", lookup).await {
            Ok(replied) => replied,
            Err(e) => {
                tracing::warn!("{}", logs::recheck_fail(uri, &format!("{e:#}")));
                false
            }
        }
    }

    async fn reply_to(&self, post: &SourcePost, run: &RunContext) -> Result<MentionOutcome> {
        let timeout = self.settings.call_timeout;

        if run.recheck_replied && self.already_replied(&post.uri).await {
            tracing::info!("{}", logs::already_replied(&post.uri));
            return Ok(MentionOutcome::AlreadyHandled);
        }
        tracing::info!("{}", logs::replying(&post.uri));

        let text = bounded(
            timeout,
            "generate reply",
            self.deps.generator.generate_reply(
                &post.text,
                post.image_url.as_deref(),
                &run.mention_token,
            ),
        )
        .await
        .context("Failed to generate reply")?;

        let published = match publish_reply(
            self.deps.social.as_ref(),
            self.deps.generator.as_ref(),
            post,
            &text,
            timeout,
        )
        .await?
        {
            PublishOutcome::Published(posts) => posts,
            PublishOutcome::EmptySplit => return Ok(MentionOutcome::EmptySplit),
        };

        let record = ReplyRecord {
            bot_name: self.settings.bot_name.clone(),
            uri: post.uri.clone(),
        };
        match bounded(timeout, "record reply", self.deps.replies.record_reply(&record)).await {
            Ok(RecordOutcome::Recorded) => {}
            Ok(RecordOutcome::AlreadyRecorded) => {
                tracing::warn!("{}", logs::duplicate_record(&post.uri, published.len()));
                return Ok(MentionOutcome::AlreadyHandled);
            }
            Err(e) => {
                tracing::error!("{}", logs::record_fail(&post.uri, &format!("{e:#}")));
                return Ok(MentionOutcome::Failed);
            }
        }

        tracing::info!("{}", logs::replied(&post.uri, published.len()));
        Ok(MentionOutcome::Replied {
            posts: published.len(),
        })
    }
}
