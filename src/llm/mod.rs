//! Generation backend integration.
//!
//! Provides the [`LlmProvider`] trait the workflow nodes depend on, the
//! OpenAI-compatible [`GenClient`] implementation, and the [`normalize`]
//! function that turns raw model output into plain source text.

mod client;
mod normalize;

pub use client::{
    ContentFragment, GenClient, GenerationRequest, GenerationResponse, LlmProvider, Message,
    MessageContent, API_KEY_ENV, DEFAULT_API_BASE, DEFAULT_MODEL,
};
pub use normalize::normalize;
