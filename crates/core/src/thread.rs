//! Plot threads and narrative beats.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle of a plot thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Open,
    Developing,
    Climax,
    Resolved,
    Legacy,
}

impl ThreadStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Open => "open",
            Self::Developing => "developing",
            Self::Climax => "climax",
            Self::Resolved => "resolved",
            Self::Legacy => "legacy",
        }
    }

    /// Resolved and legacy threads are excluded from active scoring.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(*self, Self::Open | Self::Developing | Self::Climax)
    }
}

impl FromStr for ThreadStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "developing" => Ok(Self::Developing),
            "climax" => Ok(Self::Climax),
            "resolved" => Ok(Self::Resolved),
            "legacy" => Ok(Self::Legacy),
            other => Err(CoreError::UnknownVariant { kind: "thread status", value: other.to_owned() }),
        }
    }
}

/// Priority tier of a plot thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThreadPriority {
    Main,
    Sub,
    Minor,
}

impl ThreadPriority {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Main => "main",
            Self::Sub => "sub",
            Self::Minor => "minor",
        }
    }

    /// Base relevance contribution in `[0, 1]`.
    #[must_use]
    pub const fn base_score(&self) -> f32 {
        match *self {
            Self::Main => 1.0,
            Self::Sub => 0.6,
            Self::Minor => 0.3,
        }
    }

    /// Lenient mapping; unknown tiers become `Sub`.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "main" | "major" | "primary" | "core" => Self::Main,
            "minor" | "side" | "background" => Self::Minor,
            _ => Self::Sub,
        }
    }
}

/// A narrative promise the story owes a development or payoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlotThread {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub priority: ThreadPriority,
    pub status: ThreadStatus,
    pub related_characters: Vec<String>,
    pub introduced_chapter: u32,
    pub last_touched_chapter: u32,
    /// Chapter by which the thread should pay off.
    pub payoff_deadline: Option<u32>,
}

/// Recurring narrative event type subject to reuse cooldown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BeatType {
    Duel,
    Training,
    Treasure,
    FaceSlap,
    Escape,
    Romance,
    Breakthrough,
    Rescue,
    Revelation,
    Auction,
    Betrayal,
    Tournament,
    AllyDeath,
    War,
}

impl BeatType {
    pub const ALL: &'static [Self] = &[
        Self::Duel,
        Self::Training,
        Self::Treasure,
        Self::FaceSlap,
        Self::Escape,
        Self::Romance,
        Self::Breakthrough,
        Self::Rescue,
        Self::Revelation,
        Self::Auction,
        Self::Betrayal,
        Self::Tournament,
        Self::AllyDeath,
        Self::War,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Duel => "duel",
            Self::Training => "training",
            Self::Treasure => "treasure",
            Self::FaceSlap => "face_slap",
            Self::Escape => "escape",
            Self::Romance => "romance",
            Self::Breakthrough => "breakthrough",
            Self::Rescue => "rescue",
            Self::Revelation => "revelation",
            Self::Auction => "auction",
            Self::Betrayal => "betrayal",
            Self::Tournament => "tournament",
            Self::AllyDeath => "ally_death",
            Self::War => "war",
        }
    }

    #[must_use]
    pub const fn category(&self) -> &'static str {
        match *self {
            Self::Duel | Self::War => "combat",
            Self::Training | Self::Breakthrough => "growth",
            Self::Treasure | Self::FaceSlap => "reward",
            Self::Escape | Self::Rescue => "tension",
            Self::Romance | Self::Betrayal => "relationship",
            Self::Revelation => "mystery",
            Self::Auction | Self::Tournament => "competition",
            Self::AllyDeath => "loss",
        }
    }

    /// Cooldown in chapters, proportional to narrative weight.
    #[must_use]
    pub const fn cooldown(&self) -> u32 {
        match *self {
            Self::FaceSlap => 3,
            Self::Duel | Self::Training => 4,
            Self::Treasure => 6,
            Self::Escape | Self::Romance => 8,
            Self::Breakthrough => 10,
            Self::Rescue => 12,
            Self::Revelation => 15,
            Self::Auction => 20,
            Self::Betrayal => 25,
            Self::Tournament => 30,
            Self::AllyDeath => 40,
            Self::War => 60,
        }
    }

    /// Whole-word signal terms used to detect the beat in committed prose.
    #[must_use]
    pub const fn keywords(&self) -> &'static [&'static str] {
        match *self {
            Self::Duel => &["duel", "crossed blades", "challenge him", "sparring"],
            Self::Training => &["trained", "training", "practice", "drills"],
            Self::Treasure => &["treasure", "artifact", "inheritance", "relic"],
            Self::FaceSlap => &["humiliated", "arrogant", "looked down on", "slapped"],
            Self::Escape => &["escape", "fled", "pursuers", "chase"],
            Self::Romance => &["blushed", "her hand in his", "kiss", "heartbeat quickened"],
            Self::Breakthrough => &["breakthrough", "broke through", "advanced to", "bottleneck shattered"],
            Self::Rescue => &["rescued", "saved her", "saved him", "came to the rescue"],
            Self::Revelation => &["the truth was", "revealed", "realized who"],
            Self::Auction => &["auction", "bid", "auctioneer"],
            Self::Betrayal => &["betrayed", "betrayal", "traitor", "stabbed in the back"],
            Self::Tournament => &["tournament", "competition", "bracket", "finals"],
            Self::AllyDeath => &["died in his arms", "last breath", "funeral"],
            Self::War => &["war", "army", "battlefield", "siege"],
        }
    }
}

impl FromStr for BeatType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == lower)
            .ok_or(CoreError::UnknownVariant { kind: "beat type", value: lower })
    }
}

/// Record of a beat used in a chapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeatUsage {
    pub project_id: String,
    pub beat: BeatType,
    pub chapter: u32,
    /// First chapter at which the beat may be used again.
    pub cooldown_until: u32,
}

impl BeatUsage {
    #[must_use]
    pub fn new(project_id: impl Into<String>, beat: BeatType, chapter: u32) -> Self {
        Self { project_id: project_id.into(), beat, chapter, cooldown_until: chapter + beat.cooldown() }
    }

    #[must_use]
    pub const fn is_cooling_down(&self, chapter: u32) -> bool {
        chapter < self.cooldown_until
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_war_costs_more_than_duel() {
        assert!(BeatType::War.cooldown() > BeatType::Duel.cooldown() * 10);
    }

    #[test]
    fn test_beat_from_str() {
        assert_eq!("face slap".parse::<BeatType>().ok(), Some(BeatType::FaceSlap));
        assert!("picnic".parse::<BeatType>().is_err());
    }

    #[test]
    fn test_cooldown_window() {
        let usage = BeatUsage::new("p", BeatType::Duel, 10);
        assert!(usage.is_cooling_down(13));
        assert!(!usage.is_cooling_down(14));
    }

    #[test]
    fn test_active_statuses() {
        assert!(ThreadStatus::Climax.is_active());
        assert!(!ThreadStatus::Legacy.is_active());
        assert_eq!("Resolved".parse::<ThreadStatus>().ok(), Some(ThreadStatus::Resolved));
    }
}
