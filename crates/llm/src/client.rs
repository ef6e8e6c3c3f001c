use std::time::Duration;

use async_trait::async_trait;
use novelmill_core::text::truncate;
use novelmill_core::{env_parse_with_default, env_string};

use crate::ai_types::{ChatRequest, ChatResponse, Message, ResponseFormat};
use crate::error::LlmError;
use crate::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, FinishReason, TokenUsage,
};

/// Default LLM model to use.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default OpenAI-compatible endpoint.
pub const DEFAULT_API_URL: &str = "https://api.openai.com";

/// Connection and retry settings for [`LlmClient`].
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: usize,
    /// Linear backoff step: attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl LlmConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: DEFAULT_MODEL.to_owned(),
            timeout: Duration::from_secs(180),
            max_retries: 3,
            backoff: Duration::from_secs(2),
        }
    }

    /// Read `NOVELMILL_*` variables.
    ///
    /// # Errors
    /// Returns [`LlmError::MissingConfig`] when `NOVELMILL_API_KEY` is unset.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key =
            env_string("NOVELMILL_API_KEY").ok_or(LlmError::MissingConfig("NOVELMILL_API_KEY"))?;
        let base_url =
            env_string("NOVELMILL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        Ok(Self {
            model: env_string("NOVELMILL_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            timeout: Duration::from_secs(env_parse_with_default("NOVELMILL_LLM_TIMEOUT_SECS", 180)),
            max_retries: env_parse_with_default("NOVELMILL_LLM_MAX_RETRIES", 3),
            backoff: Duration::from_secs(env_parse_with_default("NOVELMILL_LLM_BACKOFF_SECS", 2)),
            ..Self::new(api_key, base_url)
        })
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for LLM API calls.
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("api_key", &"***")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("max_retries", &self.config.max_retries)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Creates a new LLM client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(mut config: LlmConfig) -> Result<Self, LlmError> {
        config.base_url = config.base_url.trim_end_matches('/').to_owned();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::ClientInit(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(Message { role: "system".to_owned(), content: system.clone() });
        }
        messages.push(Message { role: "user".to_owned(), content: request.prompt.clone() });
        ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .structured
                .then(|| ResponseFormat { format_type: "json_object".to_owned() }),
        }
    }

    /// One HTTP round-trip without retry.
    async fn send_once(&self, body: &ChatRequest) -> Result<CompletionResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body =
                response.text().await.unwrap_or_else(|_| "Could not read error body".to_owned());
            return Err(LlmError::HttpStatus { code: status.as_u16(), body });
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let chat_response: ChatResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::JsonParse {
                context: format!("chat completion response (body: {})", truncate(&body, 200)),
                source: e,
            })?;

        let first_choice = chat_response.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        let text = first_choice.message.content.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(CompletionResponse {
            text,
            finish_reason: FinishReason::from_api(first_choice.finish_reason.as_deref()),
            usage: chat_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    fn classify(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(self.config.timeout.as_secs())
        } else {
            LlmError::HttpRequest(err)
        }
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(request);
        let max_retries = self.config.max_retries;
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = self.config.backoff.saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX));
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms = delay.as_millis(),
                    error = %last_error.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "LLM retry"
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&body).await {
                Ok(response) => {
                    if response.finish_reason.is_truncated() {
                        tracing::debug!(model = %self.config.model, "completion hit max_tokens");
                    }
                    return Ok(response);
                },
                Err(err) if err.is_transient() => last_error = Some(err),
                Err(err) => return Err(err),
            }
        }

        Err(LlmError::RetriesExhausted(Box::new(last_error.unwrap_or(LlmError::EmptyResponse))))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
