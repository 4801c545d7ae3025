//! # Main Entry Point
//!
//! Runs the reply bot once:
//! - Domain: Configuration and Types
//! - Infrastructure: Bluesky, Supabase, LLM
//! - Application: Auth, Mentions, Generator, Publisher, Pipeline
//!
//! Meant to be triggered periodically by an external scheduler (cron, CI job).

mod application;
mod domain;
mod infrastructure;
mod strings;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::application::generator::ReplyGenerator;
use crate::application::pipeline::{Deps, ReplyPipeline, RunSettings};
use crate::domain::config::{AppConfig, LoggingConfig};
use crate::domain::types::Credentials;
use crate::infrastructure::bluesky::BlueskyClient;
use crate::infrastructure::llm::Client as LlmClient;
use crate::infrastructure::supabase::SupabaseStore;
use crate::strings::logs;

const DEFAULT_LOG_FILTER: &str = "info,hyper=warn,reqwest=warn";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Configuration
    let config = AppConfig::load().context("Invalid configuration")?;

    // 2. Logging Setup
    let _guard = init_logging(&config.logging)?;
    tracing::info!("{}", logs::STARTING);
    tracing::info!(
        "{}",
        logs::config_loaded(&config.services.bluesky.handle, &config.bot.name)
    );

    // 3. Initialize Infrastructure
    let http_timeout = Duration::from_secs(config.system.call_timeout_secs.max(1));

    let social = Arc::new(BlueskyClient::new(&config.services.bluesky.service));
    let store = Arc::new(SupabaseStore::new(
        &config.services.supabase.url,
        &config.services.supabase.key,
        &config.store.replies_table,
        &config.store.sessions_table,
        http_timeout,
    )?);
    let llm = Arc::new(LlmClient::new(config.agent.clone()));
    let generator = Arc::new(ReplyGenerator::new(llm, config.agent.max_tokens));

    // 4. Run the pipeline once
    let deps = Deps {
        social,
        replies: store.clone(),
        sessions: store,
        generator,
    };
    let credentials = Credentials {
        identifier: config.services.bluesky.handle.clone(),
        password: config.services.bluesky.password.clone(),
    };

    let pipeline = ReplyPipeline::new(deps, RunSettings::from_config(&config));
    match pipeline.run(&credentials).await {
        Ok(summary) => {
            tracing::info!("Run finished: {}", summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run aborted: {:#}", e);
            Err(e)
        }
    }
}

/// Console logging, plus a file sink when `logging.file` is set.
/// The returned guard flushes the file writer on drop.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
    });

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    let (file_layer, guard) = match &config.file {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let name = path
                .file_name()
                .with_context(|| format!("Log file path {file} has no file name"))?;

            let file_appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
