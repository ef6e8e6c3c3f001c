use serde::{Deserialize, Serialize};

/// Dominant register of a prose sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    Emotional,
    Descriptive,
    Action,
    #[default]
    Balanced,
}

impl Register {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Emotional => "emotional",
            Self::Descriptive => "descriptive",
            Self::Action => "action",
            Self::Balanced => "balanced",
        }
    }
}

/// Measured stylistic metrics of a prose sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct StyleMetrics {
    pub avg_sentence_words: f32,
    /// Share of characters inside dialogue quotes, `0..1`.
    pub dialogue_ratio: f32,
    /// Share of sentences that read as inner monologue, `0..1`.
    pub monologue_ratio: f32,
    pub register: Register,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriftDimension {
    DialogueRatio,
    SentenceLength,
    Register,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriftWarning {
    pub dimension: DriftDimension,
    pub detected_chapter: u32,
    pub message: String,
}

/// Authorial voice fingerprint; recomputed from a fixed-size rolling sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VoiceFingerprint {
    pub project_id: String,
    /// Metrics of the first sample, the voice the story should keep.
    pub baseline: StyleMetrics,
    pub current: StyleMetrics,
    pub signature_phrases: Vec<String>,
    pub avoided_phrases: Vec<String>,
    pub drift_warnings: Vec<DriftWarning>,
    pub sampled_chapters: Vec<u32>,
    pub computed_chapter: u32,
}
