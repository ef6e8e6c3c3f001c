//! Character Arc Tracker: arc phases and the alive/dead/missing roster.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use novelmill_core::{ArcPhase, CharacterArc, CharacterState, LifeStatus};
use novelmill_llm::CompletionProvider;
use novelmill_storage::NarrativeStore;
use serde::Deserialize;

use crate::error::TrackerError;
use crate::structured::ask;
use crate::tracker::{CommittedChapter, FragmentQuery, MemoryTracker};

const FRAGMENT_LIMIT: usize = 8;

/// Latest known state of every tracked character, split by life status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    pub alive: Vec<CharacterState>,
    pub dead: Vec<CharacterState>,
    pub missing: Vec<CharacterState>,
}

impl Roster {
    #[must_use]
    pub fn from_states(states: Vec<CharacterState>) -> Self {
        let mut roster = Self::default();
        for state in states {
            match state.status {
                LifeStatus::Dead => roster.dead.push(state),
                LifeStatus::Missing => roster.missing.push(state),
                LifeStatus::Alive | LifeStatus::Unknown => roster.alive.push(state),
            }
        }
        roster
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alive.is_empty() && self.dead.is_empty() && self.missing.is_empty()
    }

    #[must_use]
    pub fn dead_names(&self) -> Vec<&str> {
        self.dead.iter().map(|s| s.name.as_str()).collect()
    }

    /// Prompt section listing who is alive and who must not appear.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("CHARACTER ROSTER:\n");
        for state in &self.alive {
            let _ = write!(out, "- {} (alive", state.name);
            if !state.power.is_empty() {
                let _ = write!(out, ", {}", state.power);
            }
            if !state.location.is_empty() {
                let _ = write!(out, ", at {}", state.location);
            }
            out.push_str(")\n");
        }
        for state in &self.missing {
            let _ = writeln!(out, "- {} (missing since chapter {})", state.name, state.chapter);
        }
        if !self.dead.is_empty() {
            let dead: Vec<String> =
                self.dead.iter().map(|s| format!("{} (died by chapter {})", s.name, s.chapter)).collect();
            let _ = writeln!(
                out,
                "FORBIDDEN, ALREADY DEAD: {}. They may appear only in explicitly marked flashbacks or memories.",
                dead.join(", ")
            );
        }
        out
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Extraction {
    states: Vec<StateRow>,
    new_arcs: Vec<NewArc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StateRow {
    name: String,
    status: String,
    power: String,
    location: String,
    /// The character appears only in a memory or flashback.
    flashback: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NewArc {
    name: String,
    role: String,
    internal_conflict: String,
    phases: Vec<PhaseRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhaseRow {
    start_chapter: u32,
    end_chapter: u32,
    traits: String,
    transition_trigger: String,
}

fn extraction_prompt(chapter: &CommittedChapter, untracked: &[&str]) -> String {
    let untracked = if untracked.is_empty() { "none".to_owned() } else { untracked.join(", ") };
    format!(
        r#"Extract character states from chapter {number}. Characters on stage: {cast}.

Return JSON:
{{
  "states": [{{"name": "...", "status": "alive|dead|missing|unknown", "power": "current power level", "location": "where they are at chapter end", "flashback": false}}],
  "new_arcs": [{{"name": "...", "role": "ally|rival|mentor|antagonist", "internal_conflict": "...", "phases": [{{"start_chapter": {number}, "end_chapter": {horizon}, "traits": "...", "transition_trigger": "..."}}]}}]
}}
Set "flashback": true for anyone who appears only in a memory, dream or flashback.
Give new_arcs only for these characters without an arc: {untracked}.

CHAPTER TEXT:
{body}"#,
        number = chapter.number,
        horizon = chapter.number + 40,
        cast = chapter.cast.join(", "),
        body = chapter.body,
    )
}

pub struct CharacterArcTracker {
    store: Arc<dyn NarrativeStore>,
    llm: Arc<dyn CompletionProvider>,
}

impl CharacterArcTracker {
    #[must_use]
    pub fn new(store: Arc<dyn NarrativeStore>, llm: Arc<dyn CompletionProvider>) -> Self {
        Self { store, llm }
    }

    /// Roster as it stood when `chapter` begins; later deaths are not yet known.
    pub async fn roster(&self, project_id: &str, chapter: u32) -> Result<Roster, TrackerError> {
        Ok(Roster::from_states(self.store.character_states_before(project_id, chapter).await?))
    }

    async fn advance_phases(
        &self,
        chapter: u32,
        arcs: &mut [CharacterArc],
    ) -> Result<(), TrackerError> {
        for arc in arcs.iter_mut() {
            if let Some(index) = arc.phase_index_at(chapter).filter(|i| *i > arc.current_phase) {
                tracing::debug!(character = %arc.name, chapter, phase = index, "arc phase advanced");
                arc.current_phase = index;
                self.store.upsert_character_arc(arc).await?;
            }
        }
        Ok(())
    }

    async fn record_states(
        &self,
        chapter: &CommittedChapter,
        rows: Vec<StateRow>,
    ) -> Result<(), TrackerError> {
        let latest: HashMap<String, CharacterState> = self
            .store
            .character_states_before(&chapter.project_id, chapter.number)
            .await?
            .into_iter()
            .map(|s| (s.name.to_lowercase(), s))
            .collect();

        for row in rows {
            let name = row.name.trim();
            if name.is_empty() || row.flashback {
                continue;
            }
            let prior = latest.get(&name.to_lowercase());
            let mut status = LifeStatus::coerce(&row.status);
            if status == LifeStatus::Unknown {
                status = prior.map_or(LifeStatus::Unknown, |p| p.status);
            }
            if let Some(prior) = prior.filter(|p| p.status == LifeStatus::Dead) {
                if status != LifeStatus::Dead {
                    tracing::warn!(
                        project = %chapter.project_id,
                        chapter = chapter.number,
                        character = %prior.name,
                        died = prior.chapter,
                        "refusing to resurrect dead character"
                    );
                }
                continue;
            }
            let state = CharacterState {
                project_id: chapter.project_id.clone(),
                name: prior.map_or_else(|| name.to_owned(), |p| p.name.clone()),
                chapter: chapter.number,
                status,
                power: non_empty_or(row.power, prior.map(|p| p.power.as_str())),
                location: non_empty_or(row.location, prior.map(|p| p.location.as_str())),
                recorded_at: Utc::now(),
            };
            self.store.record_character_state(&state).await?;
        }
        Ok(())
    }
}

fn non_empty_or(value: String, fallback: Option<&str>) -> String {
    if value.trim().is_empty() { fallback.unwrap_or_default().to_owned() } else { value.trim().to_owned() }
}

fn to_arc(project_id: &str, chapter: u32, new: NewArc) -> CharacterArc {
    let mut phases: Vec<ArcPhase> = new
        .phases
        .into_iter()
        .map(|p| ArcPhase {
            start_chapter: p.start_chapter.max(chapter),
            end_chapter: p.end_chapter,
            traits: p.traits,
            transition_trigger: p.transition_trigger,
        })
        .collect();
    if phases.is_empty() {
        phases.push(ArcPhase {
            start_chapter: chapter,
            end_chapter: chapter + 40,
            traits: String::new(),
            transition_trigger: String::new(),
        });
    }
    let mut arc = CharacterArc {
        project_id: project_id.to_owned(),
        name: new.name.trim().to_owned(),
        role: new.role,
        internal_conflict: new.internal_conflict,
        phases,
        current_phase: 0,
    };
    arc.normalize_phases();
    arc
}

#[async_trait]
impl MemoryTracker for CharacterArcTracker {
    fn name(&self) -> &'static str {
        "character"
    }

    async fn on_chapter_committed(&self, chapter: &CommittedChapter) -> Result<(), TrackerError> {
        let mut arcs = self.store.list_character_arcs(&chapter.project_id).await?;
        self.advance_phases(chapter.number, &mut arcs).await?;

        let untracked: Vec<&str> = chapter
            .cast
            .iter()
            .map(String::as_str)
            .filter(|name| !arcs.iter().any(|a| a.name.eq_ignore_ascii_case(name)))
            .collect();
        let extraction: Extraction =
            ask(self.llm.as_ref(), extraction_prompt(chapter, &untracked), 2000).await?;

        for new in extraction.new_arcs {
            let name = new.name.trim();
            if name.is_empty() || arcs.iter().any(|a| a.name.eq_ignore_ascii_case(name)) {
                continue;
            }
            let arc = to_arc(&chapter.project_id, chapter.number, new);
            self.store.upsert_character_arc(&arc).await?;
            arcs.push(arc);
        }
        self.record_states(chapter, extraction.states).await
    }

    async fn context_fragment(
        &self,
        query: &FragmentQuery<'_>,
    ) -> Result<Option<String>, TrackerError> {
        let arcs = self.store.list_character_arcs(&query.project.id).await?;
        let on_stage: Vec<&CharacterArc> = arcs
            .iter()
            .filter(|a| query.cast.is_empty() || query.cast.iter().any(|c| c.eq_ignore_ascii_case(&a.name)))
            .take(FRAGMENT_LIMIT)
            .collect();
        if on_stage.is_empty() {
            return Ok(None);
        }
        let mut out = String::from("CHARACTER ARCS:\n");
        for arc in on_stage {
            let _ = write!(out, "- {} ({})", arc.name, arc.role);
            let phase = arc.phase_index_at(query.chapter).and_then(|i| arc.phases.get(i)).or_else(|| arc.current());
            if let Some(phase) = phase {
                if !phase.traits.is_empty() {
                    let _ = write!(out, ": {}", phase.traits);
                }
                if !phase.transition_trigger.is_empty() {
                    let _ = write!(out, "; turns when {}", phase.transition_trigger);
                }
            }
            if !arc.internal_conflict.is_empty() {
                let _ = write!(out, "; inner conflict: {}", arc.internal_conflict);
            }
            out.push('\n');
        }
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use novelmill_llm::ScriptedProvider;
    use novelmill_storage::CharacterStore;

    use super::*;
    use crate::test_support::{committed, dyn_store, llm, outline, project, scene, store};

    fn state(name: &str, chapter: u32, status: LifeStatus) -> CharacterState {
        CharacterState {
            project_id: "p1".to_owned(),
            name: name.to_owned(),
            chapter,
            status,
            power: "core formation".to_owned(),
            location: "sect".to_owned(),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_dead_characters_are_never_resurrected() {
        let store = store();
        store.record_character_state(&state("Old Zhao", 10, LifeStatus::Dead)).await.unwrap();
        let provider = llm(ScriptedProvider::new().on(
            "Extract character states",
            r#"{"states": [
                {"name": "old zhao", "status": "alive", "power": "", "location": "tavern", "flashback": false},
                {"name": "Mara", "status": "wounded", "power": "foundation", "location": "", "flashback": false},
                {"name": "Lin", "status": "alive", "power": "qi 3", "location": "cliff", "flashback": true}
            ]}"#,
        ));
        let tracker = CharacterArcTracker::new(dyn_store(&store), provider);
        tracker.on_chapter_committed(&committed(12, "text", None)).await.unwrap();

        let roster = tracker.roster("p1", 13).await.unwrap();
        assert_eq!(roster.dead_names(), vec!["Old Zhao"]);
        assert_eq!(roster.dead[0].chapter, 10);
        assert_eq!(roster.alive.len(), 1);
        assert_eq!(roster.alive[0].name, "Mara");
        assert_eq!(roster.alive[0].power, "foundation");
    }

    #[tokio::test]
    async fn test_gap_fill_records_state_before_a_later_death() {
        let store = store();
        store.record_character_state(&state("Mara", 40, LifeStatus::Alive)).await.unwrap();
        store.record_character_state(&state("Mara", 48, LifeStatus::Dead)).await.unwrap();
        let provider = llm(ScriptedProvider::new().on(
            "Extract character states",
            r#"{"states": [{"name": "Mara", "status": "alive", "power": "", "location": "ravine", "flashback": false}]}"#,
        ));
        let tracker = CharacterArcTracker::new(dyn_store(&store), provider);
        tracker.on_chapter_committed(&committed(46, "text", None)).await.unwrap();

        let at_47 = tracker.roster("p1", 47).await.unwrap();
        assert_eq!(at_47.alive[0].location, "ravine");
        assert!(at_47.dead.is_empty());
        assert_eq!(tracker.roster("p1", 49).await.unwrap().dead_names(), vec!["Mara"]);
    }

    #[tokio::test]
    async fn test_dead_stays_dead_across_randomized_fixtures() {
        let statuses = ["alive", "dead", "missing", "unknown", "captured", "slain", "???"];
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };
        let names = ["Mara", "Qiu", "Zhao"];
        for _ in 0..20 {
            let store = store();
            let mut died_at: HashMap<&str, u32> = HashMap::new();
            for chapter in 1..=12u32 {
                let rows: Vec<String> = names
                    .iter()
                    .map(|n| {
                        let status = statuses[(next() % statuses.len() as u64) as usize];
                        let flashback = next() % 5 == 0;
                        format!(r#"{{"name": "{n}", "status": "{status}", "flashback": {flashback}}}"#)
                    })
                    .collect();
                let reply = format!(r#"{{"states": [{}]}}"#, rows.join(","));
                let tracker = CharacterArcTracker::new(
                    dyn_store(&store),
                    llm(ScriptedProvider::new().on("Extract character states", reply)),
                );
                tracker.on_chapter_committed(&committed(chapter, "text", None)).await.unwrap();
                let roster = tracker.roster("p1", chapter + 1).await.unwrap();
                for dead in &roster.dead {
                    died_at.entry(names.iter().find(|n| **n == dead.name).copied().unwrap_or("?")).or_insert(dead.chapter);
                }
                for (name, died) in &died_at {
                    assert!(roster.dead.iter().any(|s| s.name == *name && s.chapter == *died));
                    assert!(!roster.alive.iter().chain(&roster.missing).any(|s| s.name == *name));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_new_arcs_are_created_and_phases_advance() {
        let store = store();
        let provider = llm(ScriptedProvider::new().on(
            "Extract character states",
            r#"{"states": [], "new_arcs": [{"name": "Mara", "role": "rival", "internal_conflict": "envy versus loyalty",
                "phases": [{"start_chapter": 5, "end_chapter": 9, "traits": "cold", "transition_trigger": "Lin saves her"},
                           {"start_chapter": 10, "end_chapter": 30, "traits": "grudging ally", "transition_trigger": "the betrayal"}]}]}"#,
        ));
        let tracker = CharacterArcTracker::new(dyn_store(&store), provider);
        let plan = outline(vec![scene("Hall", &["Lin", "Mara"], "spar", "pride")], "hook");
        tracker.on_chapter_committed(&committed(5, "text", Some(plan))).await.unwrap();

        let arcs = store.list_character_arcs("p1").await.unwrap();
        assert_eq!(arcs.len(), 1);
        assert_eq!(arcs[0].current_phase, 0);

        tracker.on_chapter_committed(&committed(11, "text", None)).await.unwrap();
        let arcs = store.list_character_arcs("p1").await.unwrap();
        assert_eq!(arcs.len(), 1);
        assert_eq!(arcs[0].current_phase, 1);

        let project = project();
        let cast = vec!["Mara".to_owned()];
        let fragment = tracker
            .context_fragment(&FragmentQuery { project: &project, chapter: 12, cast: &cast })
            .await
            .unwrap()
            .unwrap();
        assert!(fragment.contains("Mara (rival): grudging ally; turns when the betrayal"));
    }

    #[test]
    fn test_roster_render_lists_forbidden_dead() {
        let roster = Roster::from_states(vec![
            state("Mara", 3, LifeStatus::Alive),
            state("Old Zhao", 10, LifeStatus::Dead),
        ]);
        let text = roster.render();
        assert!(text.contains("- Mara (alive, core formation, at sect)"));
        assert!(text.contains("FORBIDDEN, ALREADY DEAD: Old Zhao (died by chapter 10)"));
    }
}
