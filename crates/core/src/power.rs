use serde::{Deserialize, Serialize};

use crate::constants::POWER_HISTORY_LIMIT;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ability {
    pub name: String,
    /// Proficiency tier label, e.g. "novice", "adept", "master".
    pub proficiency: String,
    pub acquired_chapter: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PowerEventKind {
    Gain,
    Loss,
    Cost,
}

/// One entry of the gain/loss ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PowerEvent {
    pub chapter: u32,
    pub kind: PowerEventKind,
    pub description: String,
}

/// Protagonist power snapshot; one live row per project, overwritten each update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PowerState {
    pub project_id: String,
    pub realm: String,
    pub tier: String,
    pub bottleneck: String,
    pub abilities: Vec<Ability>,
    /// Bounded to the last `POWER_HISTORY_LIMIT` entries.
    pub history: Vec<PowerEvent>,
    pub updated_chapter: u32,
}

impl PowerState {
    /// Insert into the ledger in chapter order, keeping only the most recent entries.
    pub fn push_event(&mut self, event: PowerEvent) {
        let at = self.history.partition_point(|e| e.chapter <= event.chapter);
        self.history.insert(at, event);
        if self.history.len() > POWER_HISTORY_LIMIT {
            let excess = self.history.len() - POWER_HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    #[must_use]
    pub fn recent_costs(&self, since_chapter: u32) -> Vec<&PowerEvent> {
        self.history
            .iter()
            .filter(|e| e.chapter >= since_chapter && e.kind != PowerEventKind::Gain)
            .collect()
    }

    #[must_use]
    pub fn last_gain_chapter(&self) -> Option<u32> {
        self.history.iter().rev().find(|e| e.kind == PowerEventKind::Gain).map(|e| e.chapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let mut state = PowerState::default();
        for chapter in 0..30 {
            state.push_event(PowerEvent {
                chapter,
                kind: PowerEventKind::Gain,
                description: format!("gain {chapter}"),
            });
        }
        assert_eq!(state.history.len(), POWER_HISTORY_LIMIT);
        assert_eq!(state.history.first().map(|e| e.chapter), Some(10));
        assert_eq!(state.last_gain_chapter(), Some(29));
    }

    #[test]
    fn test_older_event_lands_in_chapter_order() {
        let mut state = PowerState::default();
        for chapter in [40, 50] {
            state.push_event(PowerEvent { chapter, kind: PowerEventKind::Gain, description: String::new() });
        }
        state.push_event(PowerEvent { chapter: 46, kind: PowerEventKind::Cost, description: String::new() });
        let chapters: Vec<u32> = state.history.iter().map(|e| e.chapter).collect();
        assert_eq!(chapters, vec![40, 46, 50]);
        assert_eq!(state.last_gain_chapter(), Some(50));
    }
}
