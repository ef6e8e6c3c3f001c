//! Beat detection and cooldown-aware suggestions.

use std::collections::HashMap;

use novelmill_core::constants::BEAT_FRESHNESS_WINDOW;
use novelmill_core::text::contains_word;
use novelmill_core::{BeatType, BeatUsage};

const MAX_SUGGESTIONS: usize = 3;

/// Beats whose signal terms appear in `body`.
#[must_use]
pub fn detect_beats(body: &str) -> Vec<BeatType> {
    BeatType::ALL
        .iter()
        .copied()
        .filter(|beat| beat.keywords().iter().any(|kw| contains_word(body, kw)))
        .collect()
}

/// Longest cooldown of any beat; older usages can no longer block anything.
#[must_use]
pub fn max_cooldown() -> u32 {
    BeatType::ALL.iter().map(BeatType::cooldown).max().unwrap_or(0)
}

/// Beat guidance for one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BeatPlan {
    /// Off cooldown and not used recently, least recently used first.
    pub suggested: Vec<BeatType>,
    /// Beats still cooling down with the first chapter they are allowed again.
    pub cooling: Vec<(BeatType, u32)>,
}

/// Plan beats for `chapter` from the usage history.
#[must_use]
pub fn plan_beats(usages: &[BeatUsage], chapter: u32) -> BeatPlan {
    let mut latest: HashMap<BeatType, &BeatUsage> = HashMap::new();
    for usage in usages.iter().filter(|u| u.chapter < chapter) {
        latest
            .entry(usage.beat)
            .and_modify(|prev| {
                if usage.chapter > prev.chapter {
                    *prev = usage;
                }
            })
            .or_insert(usage);
    }

    let mut cooling = Vec::new();
    let mut available: Vec<(Option<u32>, BeatType)> = Vec::new();
    for beat in BeatType::ALL.iter().copied() {
        match latest.get(&beat) {
            Some(usage) if usage.is_cooling_down(chapter) => {
                cooling.push((beat, usage.cooldown_until));
            },
            Some(usage) if chapter - usage.chapter <= BEAT_FRESHNESS_WINDOW => {},
            Some(usage) => available.push((Some(usage.chapter), beat)),
            None => available.push((None, beat)),
        }
    }
    available.sort_by_key(|(last_used, _)| *last_used);
    cooling.sort_by_key(|(_, until)| std::cmp::Reverse(*until));

    BeatPlan {
        suggested: available.into_iter().take(MAX_SUGGESTIONS).map(|(_, b)| b).collect(),
        cooling,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_beats_by_whole_word() {
        let beats = detect_beats("He walked toward the auction house and placed a bid.");
        assert_eq!(beats, vec![BeatType::Auction]);
        assert!(detect_beats("A quiet morning.").is_empty());
    }

    #[test]
    fn test_cooling_beats_are_not_suggested() {
        let usages = vec![
            BeatUsage::new("p", BeatType::War, 10),
            BeatUsage::new("p", BeatType::Duel, 31),
            BeatUsage::new("p", BeatType::Training, 33),
        ];
        let plan = plan_beats(&usages, 36);
        assert!(plan.cooling.contains(&(BeatType::War, 70)));
        assert!(!plan.suggested.contains(&BeatType::War));
        // Duel is off cooldown at 35 but used within the freshness window.
        assert!(!plan.suggested.contains(&BeatType::Duel));
        assert!(!plan.cooling.iter().any(|(b, _)| *b == BeatType::Duel));
        assert_eq!(plan.suggested.len(), 3);
    }

    #[test]
    fn test_never_used_beats_come_before_used_ones() {
        let mut usages: Vec<BeatUsage> = BeatType::ALL
            .iter()
            .filter(|b| **b != BeatType::FaceSlap)
            .map(|b| BeatUsage::new("p", *b, 1))
            .collect();
        usages.push(BeatUsage::new("p", BeatType::Duel, 2));
        let plan = plan_beats(&usages, 200);
        assert_eq!(plan.suggested[0], BeatType::FaceSlap);
        assert_ne!(plan.suggested[1], BeatType::Duel);
    }
}
