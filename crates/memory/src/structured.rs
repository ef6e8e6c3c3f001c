//! Structured model calls shared by the trackers.

use novelmill_core::parse_structured;
use novelmill_llm::{CompletionProvider, CompletionRequest};
use serde::de::DeserializeOwned;

use crate::error::TrackerError;

pub(crate) const MEMORY_SYSTEM: &str = "You maintain the long-term story memory of a serialized \
novel. Answer with a single JSON object and nothing else.";

/// Ask for a JSON record and parse it through the repair path.
pub(crate) async fn ask<T: DeserializeOwned>(
    llm: &dyn CompletionProvider,
    prompt: String,
    max_tokens: u32,
) -> Result<T, TrackerError> {
    let request = CompletionRequest::new(prompt)
        .with_system(MEMORY_SYSTEM)
        .with_temperature(0.2)
        .with_max_tokens(max_tokens)
        .structured();
    let response = llm.complete(&request).await?;
    if response.finish_reason.is_truncated() {
        tracing::debug!(len = response.text.len(), "structured reply truncated, repairing");
    }
    Ok(parse_structured(&response.text)?)
}
