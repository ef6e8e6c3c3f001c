//! Scripted completion provider for tests.
//!
//! Replies are routed by substring match against the system instruction and
//! prompt, so callers that fan out concurrently still get deterministic answers.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::LlmError;
use crate::provider::{CompletionProvider, CompletionRequest, CompletionResponse, FinishReason};

/// One canned reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    Text { text: String, finish_reason: FinishReason },
    Status { code: u16, body: String },
}

impl ScriptedReply {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into(), finish_reason: FinishReason::Stop }
    }

    #[must_use]
    pub fn truncated(text: impl Into<String>) -> Self {
        Self::Text { text: text.into(), finish_reason: FinishReason::Length }
    }

    #[must_use]
    pub fn status(code: u16) -> Self {
        Self::Status { code, body: format!("scripted status {code}") }
    }

    fn into_result(self) -> Result<CompletionResponse, LlmError> {
        match self {
            Self::Text { text, finish_reason } => {
                Ok(CompletionResponse { text, finish_reason, usage: None })
            },
            Self::Status { code, body } => Err(LlmError::HttpStatus { code, body }),
        }
    }
}

#[derive(Debug)]
struct Rule {
    needle: String,
    /// The last reply repeats once the queue is down to one.
    replies: VecDeque<ScriptedReply>,
}

/// In-process [`CompletionProvider`] returning canned replies.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    rules: Mutex<Vec<Rule>>,
    fallback: Option<ScriptedReply>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request containing `needle` with `text`.
    #[must_use]
    pub fn on(self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.on_sequence(needle, vec![ScriptedReply::text(text)])
    }

    /// Answer successive requests containing `needle` with `replies` in order.
    #[must_use]
    pub fn on_sequence(mut self, needle: impl Into<String>, replies: Vec<ScriptedReply>) -> Self {
        self.rules
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Rule { needle: needle.into(), replies: replies.into() });
        self
    }

    /// Reply used when no rule matches.
    #[must_use]
    pub fn with_fallback(mut self, reply: ScriptedReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of requests whose system or prompt contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| matches(r, needle))
            .count()
    }
}

fn matches(request: &CompletionRequest, needle: &str) -> bool {
    request.prompt.contains(needle) || request.system.as_deref().is_some_and(|s| s.contains(needle))
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());

        let reply = {
            let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
            rules.iter_mut().find(|rule| matches(request, &rule.needle)).and_then(|rule| {
                if rule.replies.len() > 1 { rule.replies.pop_front() } else { rule.replies.front().cloned() }
            })
        };

        match reply.or_else(|| self.fallback.clone()) {
            Some(reply) => reply.into_result(),
            None => Err(LlmError::HttpStatus { code: 404, body: "no scripted reply".to_owned() }),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_by_needle_and_repeats_last_reply() {
        let provider = ScriptedProvider::new()
            .on_sequence("outline", vec![ScriptedReply::status(503), ScriptedReply::text("{}")])
            .on("prose", "Once upon a time.");

        let outline = CompletionRequest::new("draft the outline");
        assert!(provider.complete(&outline).await.is_err());
        assert_eq!(provider.complete(&outline).await.unwrap().text, "{}");
        assert_eq!(provider.complete(&outline).await.unwrap().text, "{}");

        let prose = CompletionRequest::new("write").with_system("prose writer");
        assert_eq!(provider.complete(&prose).await.unwrap().text, "Once upon a time.");
        assert_eq!(provider.calls_matching("outline"), 3);
    }

    #[tokio::test]
    async fn test_unmatched_request_uses_fallback_or_fails() {
        let bare = ScriptedProvider::new();
        assert!(bare.complete(&CompletionRequest::new("anything")).await.is_err());

        let with_fallback = ScriptedProvider::new().with_fallback(ScriptedReply::text("ok"));
        let reply = with_fallback.complete(&CompletionRequest::new("anything")).await.unwrap();
        assert_eq!(reply.text, "ok");
    }
}
