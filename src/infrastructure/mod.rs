//! # Infrastructure Layer
//!
//! Handles interactions with external systems and services.
//! Implements the traits defined in the Domain layer (SocialClient, ReplyStore, SessionStore, LlmProvider).

pub mod bluesky;
pub mod llm;
pub mod supabase;
