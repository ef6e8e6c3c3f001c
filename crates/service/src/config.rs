use novelmill_core::env_parse_with_default;
use novelmill_pipeline::GenerationConfig;

/// Settings for the orchestrator and the batch runner.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub generation: GenerationConfig,
    /// Worker pool size for [`crate::run_batch`].
    pub batch_workers: usize,
    /// Chunks without embeddings picked up after each commit.
    pub backfill_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { generation: GenerationConfig::default(), batch_workers: 3, backfill_limit: 64 }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let batch_workers =
            env_parse_with_default("NOVELMILL_BATCH_WORKERS", defaults.batch_workers);
        if batch_workers == 0 {
            tracing::warn!("NOVELMILL_BATCH_WORKERS is 0, using 1");
        }
        Self {
            generation: GenerationConfig::from_env(),
            batch_workers: batch_workers.max(1),
            backfill_limit: env_parse_with_default(
                "NOVELMILL_BACKFILL_LIMIT",
                defaults.backfill_limit,
            ),
        }
    }
}
