//! # Strings Module
//!
//! Centralizes log messages and prompt templates.

pub mod logs;
pub mod prompts;
