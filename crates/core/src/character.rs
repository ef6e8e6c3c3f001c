//! Character arcs and per-chapter character state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Life status of a character at a given chapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LifeStatus {
    Alive,
    Dead,
    Missing,
    #[default]
    Unknown,
}

impl LifeStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Alive => "alive",
            Self::Dead => "dead",
            Self::Missing => "missing",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient mapping of model vocabulary; unknown words become `Unknown`.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "alive" | "living" | "healthy" | "injured" | "wounded" => Self::Alive,
            "dead" | "deceased" | "killed" | "died" | "slain" => Self::Dead,
            "missing" | "lost" | "disappeared" | "captured" => Self::Missing,
            _ => Self::Unknown,
        }
    }
}

/// One phase of a character's arc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArcPhase {
    pub start_chapter: u32,
    pub end_chapter: u32,
    pub traits: String,
    /// Event that moves the character into the next phase.
    pub transition_trigger: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterArc {
    pub project_id: String,
    pub name: String,
    pub role: String,
    pub internal_conflict: String,
    /// Non-overlapping and chapter-ordered.
    pub phases: Vec<ArcPhase>,
    pub current_phase: usize,
}

impl CharacterArc {
    /// Sort phases by start chapter and clip overlaps so each phase starts after
    /// the previous one ends.
    pub fn normalize_phases(&mut self) {
        self.phases.sort_by_key(|p| p.start_chapter);
        let mut next_free = 0u32;
        for phase in &mut self.phases {
            if phase.start_chapter < next_free {
                phase.start_chapter = next_free;
            }
            if phase.end_chapter < phase.start_chapter {
                phase.end_chapter = phase.start_chapter;
            }
            next_free = phase.end_chapter.saturating_add(1);
        }
        self.current_phase = self.current_phase.min(self.phases.len().saturating_sub(1));
    }

    /// Index of the phase covering `chapter`, or the last phase that has started.
    #[must_use]
    pub fn phase_index_at(&self, chapter: u32) -> Option<usize> {
        self.phases
            .iter()
            .position(|p| chapter >= p.start_chapter && chapter <= p.end_chapter)
            .or_else(|| self.phases.iter().rposition(|p| p.start_chapter <= chapter))
    }

    #[must_use]
    pub fn current(&self) -> Option<&ArcPhase> {
        self.phases.get(self.current_phase)
    }
}

/// Character snapshot recorded at a chapter. The latest row per character is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterState {
    pub project_id: String,
    pub name: String,
    pub chapter: u32,
    pub status: LifeStatus,
    pub power: String,
    pub location: String,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(start: u32, end: u32) -> ArcPhase {
        ArcPhase {
            start_chapter: start,
            end_chapter: end,
            traits: String::new(),
            transition_trigger: String::new(),
        }
    }

    #[test]
    fn test_normalize_phases_removes_overlap() {
        let mut arc = CharacterArc {
            project_id: "p".into(),
            name: "Mara".into(),
            role: "rival".into(),
            internal_conflict: String::new(),
            phases: vec![phase(15, 40), phase(1, 20), phase(35, 30)],
            current_phase: 9,
        };
        arc.normalize_phases();
        let bounds: Vec<(u32, u32)> =
            arc.phases.iter().map(|p| (p.start_chapter, p.end_chapter)).collect();
        assert_eq!(bounds, vec![(1, 20), (21, 40), (41, 41)]);
        assert_eq!(arc.current_phase, 2);
        assert_eq!(arc.phase_index_at(25), Some(1));
        assert_eq!(arc.phase_index_at(99), Some(2));
    }

    #[test]
    fn test_life_status_coerce() {
        assert_eq!(LifeStatus::coerce("Slain"), LifeStatus::Dead);
        assert_eq!(LifeStatus::coerce("wounded"), LifeStatus::Alive);
        assert_eq!(LifeStatus::coerce("ascended?"), LifeStatus::Unknown);
    }
}
