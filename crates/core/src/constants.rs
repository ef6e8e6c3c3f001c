//! Shared constants for novelmill.
//!
//! Centralizes narrative tuning numbers used across trackers, pipeline and orchestrator.

/// Chapters per arc plan.
pub const ARC_SIZE: u32 = 20;

/// Chapters excluded from semantic retrieval because they are carried verbatim or as bridge.
pub const SEMANTIC_RECENCY_WINDOW: u32 = 5;

/// Default top-K for long-range semantic retrieval.
pub const SEMANTIC_TOP_K: usize = 5;

/// Minimum cosine similarity for a semantic hit to be surfaced.
pub const SEMANTIC_SIMILARITY_THRESHOLD: f32 = 0.35;

/// Target characters per memory chunk.
pub const CHUNK_TARGET_CHARS: usize = 1200;

/// Maximum plot threads surfaced in the context fragment.
pub const TOP_THREADS: usize = 5;

/// Threads within this many chapters of their payoff deadline receive urgency score.
pub const THREAD_URGENCY_WINDOW: u32 = 20;

/// Threads touched within this many chapters receive positive recency.
pub const THREAD_RECENCY_WINDOW: u32 = 50;

/// Beats used within this many chapters are de-prioritized for suggestion.
pub const BEAT_FRESHNESS_WINDOW: u32 = 5;

/// Chapter window around a planned plant/payoff chapter that counts as "on target".
pub const FORESHADOW_WINDOW: u32 = 2;

/// A `planned` hint is abandoned this many chapters past its plant target.
pub const FORESHADOW_PLANT_GRACE: u32 = 10;

/// A `planted` hint is abandoned this many chapters past its payoff target.
pub const FORESHADOW_PAYOFF_GRACE: u32 = 20;

/// Chapters sampled for the rolling voice fingerprint.
pub const VOICE_SAMPLE_SIZE: usize = 3;

/// Voice fingerprint is recomputed every this many chapters.
pub const VOICE_CHECK_INTERVAL: u32 = 5;

/// Dialogue ratio shift (absolute, 0..1) that counts as drift.
pub const VOICE_DIALOGUE_DRIFT: f32 = 0.15;

/// Average sentence length change (relative) that counts as drift.
pub const VOICE_SENTENCE_DRIFT: f32 = 0.30;

/// Power gains are considered without breakthrough signal every this many chapters.
pub const POWER_CHECK_INTERVAL: u32 = 10;

/// Maximum gain/loss ledger entries kept in the power snapshot.
pub const POWER_HISTORY_LIMIT: usize = 20;

/// Synopsis is refreshed every this many chapters.
pub const SYNOPSIS_REFRESH_INTERVAL: u32 = 10;

/// Tail of the chapter scanned for hook signals.
pub const HOOK_SCAN_CHARS: usize = 500;

/// Tail of prose carried into a continuation call.
pub const CONTINUATION_TAIL_CHARS: usize = 10_000;

/// Minimum scenes in an accepted outline.
pub const MIN_OUTLINE_SCENES: usize = 3;

/// Occurrences of a tracked phrase group that count as a moderate repetition.
pub const REPETITION_MODERATE: usize = 5;

/// Occurrences of a tracked phrase group that count as a critical repetition.
pub const REPETITION_CRITICAL: usize = 8;

/// Critic overall-score cap when a critical continuity finding exists.
pub const CONTINUITY_SCORE_CAP: f32 = 3.0;
