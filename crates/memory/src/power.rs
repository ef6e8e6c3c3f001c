//! Power Progression Tracker: protagonist realm, abilities and the gain/cost ledger.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use novelmill_core::constants::POWER_CHECK_INTERVAL;
use novelmill_core::text::contains_word;
use novelmill_core::{Ability, BeatType, PowerEvent, PowerEventKind, PowerState};
use novelmill_llm::CompletionProvider;
use novelmill_storage::NarrativeStore;
use serde::Deserialize;

use crate::error::TrackerError;
use crate::structured::ask;
use crate::tracker::{CommittedChapter, FragmentQuery, MemoryTracker};

const EXTRA_SIGNALS: &[&str] =
    &["new realm", "power surged", "awakened", "ascended", "comprehended", "evolved"];
const LEDGER_IN_FRAGMENT: usize = 5;

/// Whether the prose carries a breakthrough-like signal.
#[must_use]
pub fn has_breakthrough_signal(body: &str) -> bool {
    BeatType::Breakthrough
        .keywords()
        .iter()
        .chain(EXTRA_SIGNALS)
        .any(|kw| contains_word(body, kw))
}

/// Whether an increase may be recorded at `chapter`.
#[must_use]
pub fn gain_allowed(state: Option<&PowerState>, chapter: u32, body: &str) -> bool {
    let interval_elapsed = state
        .map_or(true, |s| chapter >= s.updated_chapter.saturating_add(POWER_CHECK_INTERVAL));
    interval_elapsed || has_breakthrough_signal(body)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PowerReport {
    realm: String,
    tier: String,
    bottleneck: String,
    gains: Vec<String>,
    costs: Vec<String>,
    losses: Vec<String>,
    abilities: Vec<AbilityRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AbilityRow {
    name: String,
    proficiency: String,
}

fn assessment_prompt(chapter: &CommittedChapter, state: &PowerState) -> String {
    let abilities: Vec<String> =
        state.abilities.iter().map(|a| format!("{} ({})", a.name, a.proficiency)).collect();
    format!(
        r#"Assess power progression of {protagonist} in chapter {number}.

CURRENT STATE: realm "{realm}", tier "{tier}", bottleneck "{bottleneck}"
ABILITIES: {abilities}

Report only changes that actually happen in the text. Every gain must have a price.
Return JSON:
{{"realm": "...", "tier": "...", "bottleneck": "...", "gains": ["..."], "costs": ["injury, debt, sacrifice paid for a gain"], "losses": ["..."], "abilities": [{{"name": "...", "proficiency": "novice|adept|master"}}]}}

CHAPTER TEXT:
{body}"#,
        protagonist = chapter.protagonist,
        number = chapter.number,
        realm = state.realm,
        tier = state.tier,
        bottleneck = state.bottleneck,
        abilities = if abilities.is_empty() { "none".to_owned() } else { abilities.join(", ") },
        body = chapter.body,
    )
}

fn apply_report(state: &mut PowerState, chapter: u32, report: PowerReport) {
    // An older chapter (gap fill) only adds ledger entries; the snapshot stays current.
    let current = chapter >= state.updated_chapter;
    let gained = !report.gains.is_empty() || state.realm.is_empty();
    if current && gained {
        if !report.realm.trim().is_empty() {
            state.realm = report.realm.trim().to_owned();
        }
        if !report.tier.trim().is_empty() {
            state.tier = report.tier.trim().to_owned();
        }
    }
    if current && !report.bottleneck.trim().is_empty() {
        state.bottleneck = report.bottleneck.trim().to_owned();
    }
    let events = report
        .gains
        .into_iter()
        .map(|d| (PowerEventKind::Gain, d))
        .chain(report.costs.into_iter().map(|d| (PowerEventKind::Cost, d)))
        .chain(report.losses.into_iter().map(|d| (PowerEventKind::Loss, d)));
    for (kind, description) in events {
        if !description.trim().is_empty() {
            state.push_event(PowerEvent { chapter, kind, description: description.trim().to_owned() });
        }
    }
    for row in report.abilities {
        let name = row.name.trim();
        if name.is_empty() {
            continue;
        }
        match state.abilities.iter_mut().find(|a| a.name.eq_ignore_ascii_case(name)) {
            Some(existing) if current && !row.proficiency.trim().is_empty() => {
                existing.proficiency = row.proficiency.trim().to_owned();
            },
            Some(_) => {},
            None => state.abilities.push(Ability {
                name: name.to_owned(),
                proficiency: row.proficiency.trim().to_owned(),
                acquired_chapter: chapter,
            }),
        }
    }
    state.updated_chapter = state.updated_chapter.max(chapter);
}

/// Chapter of the last gain that has no cost or loss recorded since.
#[must_use]
pub fn unpaid_gain(state: &PowerState) -> Option<u32> {
    let gain = state.last_gain_chapter()?;
    state.recent_costs(gain).is_empty().then_some(gain)
}

pub struct PowerTracker {
    store: Arc<dyn NarrativeStore>,
    llm: Arc<dyn CompletionProvider>,
}

impl PowerTracker {
    #[must_use]
    pub fn new(store: Arc<dyn NarrativeStore>, llm: Arc<dyn CompletionProvider>) -> Self {
        Self { store, llm }
    }
}

#[async_trait]
impl MemoryTracker for PowerTracker {
    fn name(&self) -> &'static str {
        "power"
    }

    async fn on_chapter_committed(&self, chapter: &CommittedChapter) -> Result<(), TrackerError> {
        let existing = self.store.get_power_state(&chapter.project_id).await?;
        if !gain_allowed(existing.as_ref(), chapter.number, &chapter.body) {
            return Ok(());
        }
        let mut state = existing.unwrap_or_else(|| PowerState {
            project_id: chapter.project_id.clone(),
            ..PowerState::default()
        });
        let report: PowerReport =
            ask(self.llm.as_ref(), assessment_prompt(chapter, &state), 1200).await?;
        apply_report(&mut state, chapter.number, report);
        if let Some(gain) = unpaid_gain(&state) {
            tracing::warn!(project = %chapter.project_id, chapter = chapter.number, gain, "power gain recorded without a cost");
        }
        self.store.save_power_state(&state).await?;
        Ok(())
    }

    async fn context_fragment(
        &self,
        query: &FragmentQuery<'_>,
    ) -> Result<Option<String>, TrackerError> {
        let Some(state) = self.store.get_power_state(&query.project.id).await? else {
            return Ok(None);
        };
        let mut out = format!("PROTAGONIST POWER: {} {}", state.realm, state.tier);
        if !state.bottleneck.is_empty() {
            let _ = write!(out, "; bottleneck: {}", state.bottleneck);
        }
        out.push('\n');
        if !state.abilities.is_empty() {
            let abilities: Vec<String> =
                state.abilities.iter().map(|a| format!("{} ({})", a.name, a.proficiency)).collect();
            let _ = writeln!(out, "Abilities: {}", abilities.join(", "));
        }
        let skip = state.history.len().saturating_sub(LEDGER_IN_FRAGMENT);
        for event in state.history.iter().skip(skip) {
            let kind = match event.kind {
                PowerEventKind::Gain => "gain",
                PowerEventKind::Loss => "loss",
                PowerEventKind::Cost => "cost",
            };
            let _ = writeln!(out, "- ch.{} {kind}: {}", event.chapter, event.description);
        }
        if let Some(gain) = unpaid_gain(&state) {
            let _ = writeln!(
                out,
                "WARNING: the gain in chapter {gain} has not been paid for. Show a cost (injury, debt, loss, enemy attention) before any further increase."
            );
        } else {
            out.push_str("Do not raise the protagonist's power this chapter unless the outline calls for a breakthrough.\n");
        }
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use novelmill_llm::ScriptedProvider;
    use novelmill_storage::PowerStore;

    use super::*;
    use crate::test_support::{committed, dyn_store, llm, project, store};

    const REPORT: &str = r#"{"realm": "Foundation", "tier": "early", "bottleneck": "meridian scars", "gains": ["broke into Foundation"], "costs": [], "losses": [], "abilities": [{"name": "Ember Palm", "proficiency": "adept"}]}"#;

    #[test]
    fn test_gains_need_signal_or_interval() {
        let state = PowerState { updated_chapter: 20, ..PowerState::default() };
        assert!(!gain_allowed(Some(&state), 25, "He ate noodles."));
        assert!(gain_allowed(Some(&state), 25, "At last he broke through."));
        assert!(gain_allowed(Some(&state), 30, "He ate noodles."));
        assert!(gain_allowed(None, 1, "anything"));
    }

    #[tokio::test]
    async fn test_quiet_chapter_inside_interval_skips_the_model() {
        let store = store();
        store
            .save_power_state(&PowerState { project_id: "p1".into(), updated_chapter: 20, ..PowerState::default() })
            .await
            .unwrap();
        let provider = llm(ScriptedProvider::new().on("Assess power progression", REPORT));
        let tracker = PowerTracker::new(dyn_store(&store), provider.clone());
        tracker.on_chapter_committed(&committed(23, "He rested.", None)).await.unwrap();
        assert_eq!(provider.calls().len(), 0);
        assert_eq!(store.get_power_state("p1").await.unwrap().unwrap().updated_chapter, 20);
    }

    #[tokio::test]
    async fn test_breakthrough_records_gain_and_flags_unpaid_debt() {
        let store = store();
        let provider = llm(ScriptedProvider::new().on("Assess power progression", REPORT));
        let tracker = PowerTracker::new(dyn_store(&store), provider);
        tracker.on_chapter_committed(&committed(7, "The bottleneck shattered.", None)).await.unwrap();

        let state = store.get_power_state("p1").await.unwrap().unwrap();
        assert_eq!(state.realm, "Foundation");
        assert_eq!(state.abilities[0].acquired_chapter, 7);
        assert_eq!(unpaid_gain(&state), Some(7));

        let project = project();
        let fragment = tracker
            .context_fragment(&FragmentQuery { project: &project, chapter: 8, cast: &[] })
            .await
            .unwrap()
            .unwrap();
        assert!(fragment.contains("bottleneck: meridian scars"));
        assert!(fragment.contains("- ch.7 gain: broke into Foundation"));
        assert!(fragment.contains("WARNING: the gain in chapter 7 has not been paid for"));
    }

    #[test]
    fn test_report_without_gains_keeps_realm() {
        let mut state = PowerState { realm: "Qi".into(), tier: "late".into(), ..PowerState::default() };
        let report = PowerReport {
            realm: "Core".into(),
            costs: vec!["cracked meridian".into()],
            abilities: vec![AbilityRow { name: "ember palm".into(), proficiency: String::new() }],
            ..PowerReport::default()
        };
        apply_report(&mut state, 12, report);
        assert_eq!(state.realm, "Qi");
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.abilities.len(), 1);
        assert_eq!(unpaid_gain(&state), None);
    }

    #[test]
    fn test_gap_fill_report_keeps_newer_snapshot() {
        let mut state = PowerState {
            realm: "Core".into(),
            tier: "early".into(),
            bottleneck: "heart demon".into(),
            abilities: vec![Ability { name: "ember palm".into(), proficiency: "master".into(), acquired_chapter: 30 }],
            updated_chapter: 50,
            ..PowerState::default()
        };
        let report = PowerReport {
            realm: "Foundation".into(),
            tier: "late".into(),
            bottleneck: "meridian scars".into(),
            gains: vec!["broke into late Foundation".into()],
            costs: vec!["lost a year of lifespan".into()],
            abilities: vec![AbilityRow { name: "ember palm".into(), proficiency: "adept".into() }],
            ..PowerReport::default()
        };
        apply_report(&mut state, 46, report);

        assert_eq!(state.updated_chapter, 50);
        assert_eq!((state.realm.as_str(), state.tier.as_str()), ("Core", "early"));
        assert_eq!(state.bottleneck, "heart demon");
        assert_eq!(state.abilities[0].proficiency, "master");
        assert_eq!(state.history.len(), 2);
        assert!(state.history.iter().all(|e| e.chapter == 46));
    }
}
