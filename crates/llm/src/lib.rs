//! LLM client for novelmill
//!
//! An OpenAI-compatible chat completion client with bounded linear-backoff
//! retry, exposed through the provider-neutral [`CompletionProvider`] trait.

mod ai_types;
mod client;
mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod provider;

#[cfg(test)]
mod retry_tests;

pub use client::{DEFAULT_API_URL, DEFAULT_MODEL, LlmClient, LlmConfig};
pub use error::LlmError;
#[cfg(any(test, feature = "mock"))]
pub use mock::{ScriptedProvider, ScriptedReply};
pub use provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, FinishReason, TokenUsage,
};
