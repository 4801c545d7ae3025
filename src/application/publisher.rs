//! # Publisher
//!
//! Turns generated reply text into published posts. Replies within the platform
//! limit go out as one post; longer replies are split and posted as a linear thread
//! under the mentioning post.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::application::utils::{bounded, char_len};
use crate::domain::traits::{ContentGenerator, SocialClient};
use crate::domain::types::{GeneratedReply, PostDraft, PostRef, SourcePost};
use crate::strings::logs;

/// Platform character limit for one post
pub const POST_CHAR_LIMIT: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Every segment was published, in order
    Published(Vec<PostRef>),
    /// The split produced nothing; nothing was published
    EmptySplit,
}

/// Single post when the text fits, thread otherwise
pub async fn shape_reply(
    generator: &dyn ContentGenerator,
    text: &str,
    timeout: Duration,
) -> Result<GeneratedReply> {
    if char_len(text) <= POST_CHAR_LIMIT {
        return Ok(GeneratedReply::Single(text.to_string()));
    }

    let parts = bounded(timeout, "split reply", generator.split_into_segments(text))
        .await
        .context("Failed to split reply into a thread")?;
    Ok(GeneratedReply::Thread(parts))
}

pub async fn publish_reply(
    social: &dyn SocialClient,
    generator: &dyn ContentGenerator,
    post: &SourcePost,
    text: &str,
    timeout: Duration,
) -> Result<PublishOutcome> {
    let reply = shape_reply(generator, text, timeout).await?;

    if let GeneratedReply::Thread(parts) = &reply {
        if parts.is_empty() {
            tracing::warn!("{}", logs::empty_split(&post.uri));
            return Ok(PublishOutcome::EmptySplit);
        }
        tracing::info!("{}", logs::thread_split(&post.uri, parts.len()));
    }

    let posted = publish_chain(social, &post.post_ref(), reply.segments(), timeout).await?;
    Ok(PublishOutcome::Published(posted))
}

/// Publishes `segments` as a reply chain: every post shares `root`, and each one's
/// parent is the post published before it (the root for the first).
pub async fn publish_chain(
    social: &dyn SocialClient,
    root: &PostRef,
    segments: &[String],
    timeout: Duration,
) -> Result<Vec<PostRef>> {
    let mut parent = root.clone();
    let mut published = Vec::with_capacity(segments.len());

    for (index, segment) in segments.iter().enumerate() {
        let draft = PostDraft::reply(segment.as_str(), root, &parent);
        let posted = bounded(timeout, "create post", social.create_post(&draft))
            .await
            .with_context(|| {
                format!(
                    "Failed to publish segment {}/{} under {}",
                    index + 1,
                    segments.len(),
                    root.uri
                )
            })?;
        parent = posted.clone();
        published.push(posted);
    }
    Ok(published)
}
