//! Provider-neutral completion types.

use async_trait::async_trait;

use crate::error::LlmError;

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider for a JSON object response.
    pub structured: bool,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: 0.7,
            max_tokens: 4096,
            structured: false,
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub const fn structured(mut self) -> Self {
        self.structured = true;
        self
    }
}

/// Why the model stopped producing tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FinishReason {
    #[default]
    Stop,
    /// Output budget hit; the text is truncated.
    Length,
    Other(String),
}

impl FinishReason {
    #[must_use]
    pub fn from_api(raw: Option<&str>) -> Self {
        match raw {
            None | Some("stop" | "end_turn") => Self::Stop,
            Some("length" | "max_tokens") => Self::Length,
            Some(other) => Self::Other(other.to_owned()),
        }
    }

    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        matches!(*self, Self::Length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), finish_reason: FinishReason::Stop, usage: None }
    }
}

/// Black-box completion function.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion, retrying transient failures internally.
    async fn complete(&self, request: &CompletionRequest)
    -> Result<CompletionResponse, LlmError>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_maps_known_values() {
        assert_eq!(FinishReason::from_api(Some("stop")), FinishReason::Stop);
        assert_eq!(FinishReason::from_api(None), FinishReason::Stop);
        assert!(FinishReason::from_api(Some("length")).is_truncated());
        assert_eq!(
            FinishReason::from_api(Some("content_filter")),
            FinishReason::Other("content_filter".to_owned())
        );
    }

    #[test]
    fn test_request_builder_sets_fields() {
        let req = CompletionRequest::new("write")
            .with_system("you are a novelist")
            .with_temperature(0.2)
            .with_max_tokens(512)
            .structured();
        assert_eq!(req.system.as_deref(), Some("you are a novelist"));
        assert!(req.structured);
        assert_eq!(req.max_tokens, 512);
    }
}
