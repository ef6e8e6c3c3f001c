//! Chapter outline produced by the architect step.

use serde::{Deserialize, Serialize};

/// Pacing tag of a scene.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SceneSpeed {
    Fast,
    #[default]
    Medium,
    Slow,
}

impl SceneSpeed {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
        }
    }

    /// Lenient mapping of model vocabulary onto the closed set; unknown tags become `Medium`.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if lower.contains("fast") || lower.contains("quick") || lower.contains("intense") {
            Self::Fast
        } else if lower.contains("slow") || lower.contains("calm") || lower.contains("quiet") {
            Self::Slow
        } else {
            Self::Medium
        }
    }

    /// Target words-per-sentence band.
    #[must_use]
    pub const fn sentence_band(&self) -> (u32, u32) {
        match *self {
            Self::Fast => (6, 12),
            Self::Medium => (10, 20),
            Self::Slow => (15, 30),
        }
    }

    /// Target dialogue share band, in percent.
    #[must_use]
    pub const fn dialogue_band(&self) -> (u32, u32) {
        match *self {
            Self::Fast => (30, 50),
            Self::Medium => (25, 45),
            Self::Slow => (10, 30),
        }
    }
}

/// One scene of a chapter outline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Scene {
    pub setting: String,
    pub participants: Vec<String>,
    pub goal: String,
    pub conflict: String,
    pub resolution: String,
    pub target_words: u32,
    pub speed: SceneSpeed,
    #[serde(default)]
    pub comedic: bool,
}

/// Structured chapter plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Outline {
    pub title: String,
    pub scenes: Vec<Scene>,
    pub emotional_arc: String,
    /// Closing hook; empty only in the terminal arc.
    pub hook: String,
    /// Hook technique label (e.g. "reveal", "threat", "question").
    #[serde(default)]
    pub hook_technique: String,
}

impl Outline {
    /// Distinct scene participants in first-appearance order.
    #[must_use]
    pub fn cast(&self) -> Vec<String> {
        let mut cast: Vec<String> = Vec::new();
        for name in self.scenes.iter().flat_map(|s| s.participants.iter()) {
            let trimmed = name.trim();
            if !trimmed.is_empty() && !cast.iter().any(|c| c.eq_ignore_ascii_case(trimmed)) {
                cast.push(trimmed.to_owned());
            }
        }
        cast
    }

    #[must_use]
    pub fn estimated_words(&self) -> u32 {
        self.scenes.iter().map(|s| s.target_words).sum()
    }

    #[must_use]
    pub fn has_slow_scene(&self) -> bool {
        self.scenes.iter().any(|s| s.speed == SceneSpeed::Slow)
    }

    #[must_use]
    pub fn has_comedic_beat(&self) -> bool {
        self.scenes.iter().any(|s| s.comedic)
    }
}
