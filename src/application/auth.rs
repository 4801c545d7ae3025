//! # Authentication
//!
//! Resumes the cached session for the bot when one exists, and falls back to a
//! credential login otherwise. Every session the client ends up using is persisted.
//! The handle of the authenticated account is read back from the session, since the
//! login identifier may be an email address or a DID.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::application::utils::bounded;
use crate::domain::traits::{SessionStore, SocialClient};
use crate::domain::types::{Credentials, SessionBlob, SessionRecord};
use crate::strings::logs;

/// Establishes a session and returns the handle of the authenticated account
pub async fn authenticate(
    social: &dyn SocialClient,
    sessions: &dyn SessionStore,
    bot_name: &str,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<String> {
    establish_session(social, sessions, bot_name, credentials, timeout).await?;
    bounded(timeout, "read session handle", social.handle())
        .await
        .context("Authenticated session has no handle")
}

async fn establish_session(
    social: &dyn SocialClient,
    sessions: &dyn SessionStore,
    bot_name: &str,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<()> {
    let cached = match bounded(timeout, "load session", sessions.load_session(bot_name)).await {
        Ok(cached) => cached,
        Err(e) => {
            tracing::warn!("{}", logs::session_load_fail(&format!("{e:#}")));
            None
        }
    };

    if let Some(record) = cached {
        match bounded(timeout, "resume session", social.resume(&record.session)).await {
            Ok(session) => {
                if session != record.session {
                    persist(sessions, bot_name, session, timeout).await;
                }
                tracing::info!("{}", logs::session_resumed(bot_name));
                return Ok(());
            }
            Err(e) => tracing::warn!("{}", logs::session_resume_fail(&format!("{e:#}"))),
        }
    }

    let session = bounded(
        timeout,
        "login",
        social.login(&credentials.identifier, &credentials.password),
    )
    .await
    .with_context(|| format!("Login as {} failed", credentials.identifier))?;

    tracing::info!("{}", logs::logged_in(&credentials.identifier));
    persist(sessions, bot_name, session, timeout).await;
    Ok(())
}

/// Session writes are best effort: a failure only costs a login on the next run
async fn persist(
    sessions: &dyn SessionStore,
    bot_name: &str,
    session: SessionBlob,
    timeout: Duration,
) {
    let record = SessionRecord::new(bot_name, session);
    if let Err(e) = bounded(timeout, "save session", sessions.save_session(&record)).await {
        tracing::error!("{}", logs::session_save_fail(&format!("{e:#}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{BOT_HANDLE, FakeSocial, MemorySessionStore};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn credentials() -> Credentials {
        Credentials {
            identifier: "helper@mail.example".into(),
            password: "app-pass".into(),
        }
    }

    #[tokio::test]
    async fn test_cached_session_skips_login() {
        let social = FakeSocial::default();
        let cached = SessionBlob(json!({"token": "cached"}));
        let sessions = MemorySessionStore::seeded("helper", cached.clone());

        authenticate(&social, &sessions, "helper", &credentials(), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(social.logins(), 0);
        assert_eq!(social.resume_calls.load(Ordering::SeqCst), 1);
        assert_eq!(sessions.get("helper").unwrap().session, cached);
    }

    #[tokio::test]
    async fn test_missing_session_logs_in_and_persists() {
        let social = FakeSocial::default();
        let sessions = MemorySessionStore::default();

        let handle = authenticate(&social, &sessions, "helper", &credentials(), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(handle, BOT_HANDLE);
        assert_eq!(social.logins(), 1);
        let stored = sessions.get("helper").unwrap();
        assert_eq!(stored.bot_name, "helper");
        assert_eq!(stored.session.0["token"], "fresh");
    }

    #[tokio::test]
    async fn test_failed_resume_falls_back_to_login() {
        let social = FakeSocial {
            fail_resume: true,
            ..FakeSocial::default()
        };
        let sessions = MemorySessionStore::seeded("helper", SessionBlob(json!({"token": "stale"})));

        authenticate(&social, &sessions, "helper", &credentials(), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(social.logins(), 1);
        assert_eq!(sessions.get("helper").unwrap().session.0["token"], "fresh");
    }

    #[tokio::test]
    async fn test_unreadable_store_still_logs_in() {
        let social = FakeSocial::default();
        let sessions = MemorySessionStore {
            fail_reads: true,
            ..MemorySessionStore::default()
        };

        authenticate(&social, &sessions, "helper", &credentials(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(social.logins(), 1);
    }

    #[tokio::test]
    async fn test_login_failure_is_fatal() {
        let social = FakeSocial {
            fail_login: true,
            fail_resume: true,
            ..FakeSocial::default()
        };
        let sessions = MemorySessionStore::seeded("helper", SessionBlob(json!({})));

        let err = authenticate(&social, &sessions, "helper", &credentials(), TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Login as helper@mail.example failed"));
    }
}
