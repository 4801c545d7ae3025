//! # Configuration
//!
//! Loads the bot configuration from the environment, optionally layered on top of a
//! YAML file (`data/config.yaml` or the path in `SKYREPLY_CONFIG`).
//! Secrets and identity always come from the environment; the file only tunes behaviour.

use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub const CONFIG_PATH_ENV: &str = "SKYREPLY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "data/config.yaml";

/// Main application configuration structure.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for the connected services.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServicesConfig {
    #[serde(default)]
    pub bluesky: BlueskyConfig,
    #[serde(default)]
    pub supabase: SupabaseConfig,
}

/// Bluesky account the bot posts as.
#[derive(Debug, Deserialize, Clone)]
pub struct BlueskyConfig {
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_service")]
    pub service: String,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            handle: String::new(),
            password: String::new(),
            service: default_service(),
        }
    }
}

/// Supabase project hosting the dedup and session tables.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SupabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    /// Identity key for rows in the session and dedup tables.
    #[serde(default = "default_bot_name")]
    pub name: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
        }
    }
}

/// Content generator settings.
#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// HTTP timeout in seconds for a single completion request
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: None,
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            timeout: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_replies_table")]
    pub replies_table: String,
    #[serde(default = "default_sessions_table")]
    pub sessions_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            replies_table: default_replies_table(),
            sessions_table: default_sessions_table(),
        }
    }
}

/// Run-level behaviour.
#[derive(Debug, Deserialize, Clone)]
pub struct SystemConfig {
    /// Mentions processed at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Upper bound for every external call, in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Page size for the notification listing
    #[serde(default = "default_notification_limit")]
    pub notification_limit: u32,
    /// Treat an unreadable dedup table as empty instead of aborting the run
    #[serde(default)]
    pub dedup_fail_open: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            call_timeout_secs: default_call_timeout(),
            notification_limit: default_notification_limit(),
            dedup_fail_open: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Optional log file, written in addition to stdout
    #[serde(default)]
    pub file: Option<String>,
    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_service() -> String {
    "https://bsky.social".to_string()
}
fn default_bot_name() -> String {
    "bot".to_string()
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    300
}
fn default_replies_table() -> String {
    "bot_replies".to_string()
}
fn default_sessions_table() -> String {
    "bot_sessions".to_string()
}
fn default_concurrency() -> usize {
    4
}
fn default_call_timeout() -> u64 {
    60
}
fn default_notification_limit() -> u32 {
    50
}

/// Raised when required settings are missing or blank.
#[derive(Debug, PartialEq, Eq)]
pub struct ConfigError {
    pub missing: Vec<&'static str>,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Missing or empty required settings: {}",
            self.missing.join(", ")
        )
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    /// Loads the configuration from the optional YAML file and the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok(), Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Reads the file named by `SKYREPLY_CONFIG`, or `default_path` when it exists,
    /// then layers the environment on top.
    pub fn load_with(
        env: impl Fn(&str) -> Option<String>,
        default_path: &Path,
    ) -> anyhow::Result<Self> {
        use anyhow::Context;

        let yaml = match env(CONFIG_PATH_ENV) {
            Some(path) => Some(
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {path}"))?,
            ),
            None if default_path.exists() => Some(
                std::fs::read_to_string(default_path).with_context(|| {
                    format!("Failed to read config file {}", default_path.display())
                })?,
            ),
            None => None,
        };

        Self::from_sources(yaml.as_deref(), &env)
    }

    /// Builds and validates a configuration from YAML text and an environment lookup.
    pub fn from_sources(
        yaml: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut config: AppConfig = match yaml {
            Some(text) if !text.trim().is_empty() => {
                serde_yaml::from_str(text).context("Failed to parse YAML")?
            }
            _ => AppConfig::default(),
        };

        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let targets: [(&str, &mut String); 7] = [
            ("BSKY_HANDLE", &mut self.services.bluesky.handle),
            ("BSKY_PASSWORD", &mut self.services.bluesky.password),
            ("BSKY_SERVICE", &mut self.services.bluesky.service),
            ("BOT_NAME", &mut self.bot.name),
            ("SUPABASE_URL", &mut self.services.supabase.url),
            ("SUPABASE_KEY", &mut self.services.supabase.key),
            ("OPENAI_API_KEY", &mut self.agent.api_key),
        ];

        for (key, slot) in targets {
            if let Some(value) = env(key) {
                *slot = value;
            }
        }
    }

    /// Fails fast when any required value is missing or blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, &str); 8] = [
            ("BSKY_HANDLE", self.services.bluesky.handle.as_str()),
            ("BSKY_PASSWORD", self.services.bluesky.password.as_str()),
            ("BSKY_SERVICE", self.services.bluesky.service.as_str()),
            ("BOT_NAME", self.bot.name.as_str()),
            ("SUPABASE_URL", self.services.supabase.url.as_str()),
            ("SUPABASE_KEY", self.services.supabase.key.as_str()),
            ("OPENAI_API_KEY", self.agent.api_key.as_str()),
            ("agent.model", self.agent.model.as_str()),
        ];

        let missing: Vec<&'static str> = required
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError { missing })
        }
    }
}
