//! # Supabase Store
//!
//! Implements `ReplyStore` and `SessionStore` on top of the Supabase PostgREST API.
//!
//! Expected tables:
//! - `bot_replies(uri text, bot_name text, unique (uri, bot_name))`
//! - `bot_sessions(bot_name text unique, session jsonb, updated_at timestamptz)`

use crate::domain::traits::{ReplyStore, SessionStore};
use crate::domain::types::{RecordOutcome, ReplyRecord, SessionRecord};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct UriRow {
    uri: String,
}

pub struct SupabaseStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    replies_table: String,
    sessions_table: String,
}

impl SupabaseStore {
    pub fn new(
        base_url: &str,
        api_key: &str,
        replies_table: &str,
        sessions_table: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            replies_table: replies_table.to_string(),
            sessions_table: sessions_table.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// PostgREST equality filter value
fn eq_filter(value: &str) -> String {
    format!("eq.{value}")
}

/// Query selecting the reply row for one `(bot_name, uri)` pair
fn reply_lookup(bot_name: &str, uri: &str) -> [(&'static str, String); 4] {
    [
        ("select", "uri".to_string()),
        ("bot_name", eq_filter(bot_name)),
        ("uri", eq_filter(uri)),
        ("limit", "1".to_string()),
    ]
}

async fn error_for(table: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow!("Supabase request on {table} failed (HTTP {status}): {body}")
}

#[async_trait]
impl ReplyStore for SupabaseStore {
    async fn replied_uris(&self, bot_name: &str) -> Result<HashSet<String>> {
        let response = self
            .request(Method::GET, &self.replies_table)
            .query(&[("select", "uri".to_string()), ("bot_name", eq_filter(bot_name))])
            .send()
            .await
            .context("Failed to reach Supabase")?;

        if !response.status().is_success() {
            return Err(error_for(&self.replies_table, response).await);
        }

        let rows: Vec<UriRow> = response
            .json()
            .await
            .context("Failed to parse replied posts")?;
        Ok(rows.into_iter().map(|row| row.uri).collect())
    }

    async fn is_replied(&self, bot_name: &str, uri: &str) -> Result<bool> {
        let response = self
            .request(Method::GET, &self.replies_table)
            .query(&reply_lookup(bot_name, uri))
            .send()
            .await
            .context("Failed to reach Supabase")?;

        if !response.status().is_success() {
            return Err(error_for(&self.replies_table, response).await);
        }

        let rows: Vec<UriRow> = response
            .json()
            .await
            .context("Failed to parse replied posts")?;
        Ok(!rows.is_empty())
    }

    async fn record_reply(&self, record: &ReplyRecord) -> Result<RecordOutcome> {
        let response = self
            .request(Method::POST, &self.replies_table)
            .header("Prefer", "return=minimal")
            .json(&[record])
            .send()
            .await
            .context("Failed to reach Supabase")?;

        match response.status() {
            status if status.is_success() => Ok(RecordOutcome::Recorded),
            StatusCode::CONFLICT => Ok(RecordOutcome::AlreadyRecorded),
            _ => Err(error_for(&self.replies_table, response).await),
        }
    }
}

#[async_trait]
impl SessionStore for SupabaseStore {
    async fn load_session(&self, bot_name: &str) -> Result<Option<SessionRecord>> {
        let response = self
            .request(Method::GET, &self.sessions_table)
            .query(&[
                ("select", "bot_name,session,updated_at".to_string()),
                ("bot_name", eq_filter(bot_name)),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .context("Failed to reach Supabase")?;

        if !response.status().is_success() {
            return Err(error_for(&self.sessions_table, response).await);
        }

        let rows: Vec<SessionRecord> = response
            .json()
            .await
            .context("Failed to parse session row")?;
        Ok(rows.into_iter().next())
    }

    async fn save_session(&self, record: &SessionRecord) -> Result<()> {
        let response = self
            .request(Method::POST, &self.sessions_table)
            .query(&[("on_conflict", "bot_name")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[record])
            .send()
            .await
            .context("Failed to reach Supabase")?;

        if !response.status().is_success() {
            return Err(error_for(&self.sessions_table, response).await);
        }
        Ok(())
    }
}
