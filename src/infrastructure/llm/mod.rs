//! Simple LLM API wrapper for OpenAI-compatible providers
//!
//! Provides a unified interface over OpenAI, Groq, xAI and DeepAI chat completions,
//! including image input and JSON-schema structured output.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! let client = Client::new(config.agent.clone());
//!
//! let context = Context::new()
//!     .add_system_message("You are a helpful assistant.")
//!     .add_message(Message::user("What is in this picture?").with_image(url))
//!     .with_max_tokens(300);
//!
//! let response = client.chat(context).await?;
//! println!("Response: {:?}", response.content);
//! ```

mod client;
pub mod providers;
mod types;

pub use client::Client;

pub use types::{Context, Error, Message, Provider, Response, TokenUsage};
