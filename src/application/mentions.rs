//! # Mentions
//!
//! Finds the mentions the bot has not answered yet and resolves the posts behind them.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::time::Duration;

use crate::application::utils::bounded;
use crate::domain::traits::{ReplyStore, SocialClient};
use crate::domain::types::{Notification, SourcePost};
use crate::strings::logs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionBatch {
    /// Unanswered mentions, in feed order
    pub mentions: Vec<Notification>,
    /// False when the replied set could not be read; each mention must then be
    /// checked again before anything is published for it
    pub deduplicated: bool,
}

/// Unanswered mentions.
///
/// When the replied set cannot be read the run aborts, unless `fail_open` is set,
/// in which case every mention is returned and the batch is marked as not deduplicated.
pub async fn get_mentions(
    social: &dyn SocialClient,
    replies: &dyn ReplyStore,
    bot_name: &str,
    limit: u32,
    fail_open: bool,
    timeout: Duration,
) -> Result<MentionBatch> {
    let (replied, deduplicated) =
        match bounded(timeout, "read replied posts", replies.replied_uris(bot_name)).await {
            Ok(replied) => (replied, true),
            Err(e) => {
                tracing::error!("{}", logs::dedup_read_fail(&format!("{e:#}")));
                if !fail_open {
                    return Err(e.context("Cannot tell which mentions were already answered"));
                }
                tracing::warn!("{}", logs::DEDUP_FAIL_OPEN);
                (HashSet::new(), false)
            }
        };

    let notifications = bounded(timeout, "list notifications", social.list_notifications(limit))
        .await
        .context("Failed to list notifications")?;

    let mentions = filter_mentions(notifications, &replied);
    for mention in &mentions {
        tracing::debug!(
            "Mention {} from @{} at {}",
            mention.uri,
            mention.author_handle,
            mention.indexed_at
        );
    }
    Ok(MentionBatch {
        mentions,
        deduplicated,
    })
}

/// Keeps mentions whose URI is not in `replied`
pub fn filter_mentions(notifications: Vec<Notification>, replied: &HashSet<String>) -> Vec<Notification> {
    notifications
        .into_iter()
        .filter(|n| n.is_mention() && !replied.contains(&n.uri))
        .collect()
}

/// Resolves mention posts, keeping mention order. Unresolvable posts are skipped.
pub async fn resolve_posts(
    social: &dyn SocialClient,
    mentions: &[Notification],
    timeout: Duration,
) -> Result<Vec<SourcePost>> {
    let uris: Vec<String> = mentions.iter().map(|m| m.uri.clone()).collect();
    let mut posts = bounded(timeout, "get posts", social.get_posts(&uris))
        .await
        .context("Failed to fetch mentioned posts")?;

    let mut ordered = Vec::with_capacity(mentions.len());
    for mention in mentions {
        match posts.iter().position(|p| p.uri == mention.uri) {
            Some(index) => ordered.push(posts.swap_remove(index)),
            None => tracing::warn!("{}", logs::post_missing(&mention.uri)),
        }
    }
    Ok(ordered)
}
