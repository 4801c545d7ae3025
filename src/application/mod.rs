//! # Application Layer
//!
//! The reply pipeline and the steps it is made of: authentication, mention
//! collection, content generation and publishing.

pub mod auth;
pub mod generator;
pub mod mentions;
pub mod pipeline;
pub mod publisher;
#[cfg(test)]
pub mod testing;
pub mod utils;
