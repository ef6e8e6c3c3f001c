use novelmill_core::env_parse_with_default;

/// Tuning for one chapter generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub target_words: u32,
    /// Attempts per chapter; every non-approved critique or failed step consumes one.
    pub max_attempts: u32,
    pub approval_score: f32,
    /// Hard character budget of the assembled context.
    pub context_budget_chars: usize,
    /// Previous chapters carried verbatim.
    pub recent_chapters: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            target_words: 2800,
            max_attempts: 3,
            approval_score: 7.0,
            context_budget_chars: 60_000,
            recent_chapters: 3,
        }
    }
}

impl GenerationConfig {
    /// Read `NOVELMILL_*` overrides on top of the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            target_words: env_parse_with_default("NOVELMILL_TARGET_WORDS", defaults.target_words),
            max_attempts: env_parse_with_default("NOVELMILL_MAX_ATTEMPTS", defaults.max_attempts)
                .max(1),
            approval_score: env_parse_with_default(
                "NOVELMILL_APPROVAL_SCORE",
                defaults.approval_score,
            ),
            context_budget_chars: env_parse_with_default(
                "NOVELMILL_CONTEXT_BUDGET_CHARS",
                defaults.context_budget_chars,
            ),
            recent_chapters: env_parse_with_default(
                "NOVELMILL_RECENT_CHAPTERS",
                defaults.recent_chapters,
            ),
        }
    }

    /// Effective word target: the project's own when set, else the configured one.
    #[must_use]
    pub const fn target_for(&self, project_target: u32) -> u32 {
        if project_target > 0 { project_target } else { self.target_words }
    }
}
