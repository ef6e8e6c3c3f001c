//! World Expansion Tracker: location bible and exploration gating.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use novelmill_core::text::{contains_phrase, contains_word};
use novelmill_core::{LocationBible, arc_bounds, arc_index};
use novelmill_llm::CompletionProvider;
use novelmill_storage::NarrativeStore;
use serde::Deserialize;

use crate::error::TrackerError;
use crate::structured::ask;
use crate::tracker::{CommittedChapter, FragmentQuery, MemoryTracker};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocationPlan {
    locations: Vec<PlannedLocation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlannedLocation {
    name: String,
    description: String,
    mysteries: Vec<String>,
    /// Number of arcs the location stays relevant for.
    arc_span: u32,
}

fn planning_prompt(chapter: &CommittedChapter, target_arc: u32, known: &[LocationBible]) -> String {
    let (start, end) = arc_bounds(target_arc);
    let known: Vec<&str> = known.iter().map(|l| l.name.as_str()).collect();
    format!(
        r#"Plan world locations for chapters {start}-{end} of a serialized novel. Protagonist: {protagonist}.

KNOWN LOCATIONS: {known}

Propose 2-4 NEW locations the story can open in these chapters.
Return JSON:
{{"locations": [{{"name": "...", "description": "one sentence", "mysteries": ["secret the place hides"], "arc_span": 1}}]}}"#,
        protagonist = chapter.protagonist,
        known = if known.is_empty() { "none".to_owned() } else { known.join(", ") },
    )
}

/// Whether a scene setting names `location`.
fn setting_matches(setting: &str, location: &str) -> bool {
    setting.trim().eq_ignore_ascii_case(location.trim()) || contains_phrase(setting, location)
}

pub struct WorldTracker {
    store: Arc<dyn NarrativeStore>,
    llm: Arc<dyn CompletionProvider>,
}

impl WorldTracker {
    #[must_use]
    pub fn new(store: Arc<dyn NarrativeStore>, llm: Arc<dyn CompletionProvider>) -> Self {
        Self { store, llm }
    }

    /// Names of locations prose must not mention yet.
    pub async fn unexplored_names(&self, project_id: &str) -> Result<Vec<String>, TrackerError> {
        Ok(self
            .store
            .list_locations(project_id)
            .await?
            .into_iter()
            .filter(|l| !l.explored)
            .map(|l| l.name)
            .collect())
    }

    async fn mark_explored(
        &self,
        chapter: &CommittedChapter,
        locations: &mut Vec<LocationBible>,
    ) -> Result<(), TrackerError> {
        let arc = arc_index(chapter.number);
        let settings: Vec<&str> = chapter
            .outline
            .iter()
            .flat_map(|o| o.scenes.iter())
            .map(|s| s.setting.trim())
            .filter(|s| !s.is_empty())
            .collect();

        for location in locations.iter_mut().filter(|l| !l.explored) {
            let named = settings.iter().any(|s| setting_matches(s, &location.name));
            if named || contains_word(&chapter.body, &location.name) {
                location.explored = true;
                location.explored_chapter = Some(chapter.number);
                location.arc_end = location.arc_end.max(arc);
                tracing::debug!(project = %chapter.project_id, location = %location.name, "location explored");
                self.store.upsert_location(location).await?;
            }
        }

        for setting in settings {
            if locations.iter().any(|l| setting_matches(setting, &l.name)) {
                continue;
            }
            let location = LocationBible {
                project_id: chapter.project_id.clone(),
                name: setting.to_owned(),
                description: String::new(),
                arc_start: arc,
                arc_end: arc,
                explored: true,
                explored_chapter: Some(chapter.number),
                mysteries: Vec::new(),
            };
            self.store.upsert_location(&location).await?;
            locations.push(location);
        }
        Ok(())
    }

    async fn plan_locations(
        &self,
        chapter: &CommittedChapter,
        target_arc: u32,
        known: &[LocationBible],
    ) -> Result<(), TrackerError> {
        let plan: LocationPlan =
            ask(self.llm.as_ref(), planning_prompt(chapter, target_arc, known), 1200).await?;
        for planned in plan.locations {
            let name = planned.name.trim();
            if name.is_empty() || known.iter().any(|l| l.name.eq_ignore_ascii_case(name)) {
                continue;
            }
            let location = LocationBible {
                project_id: chapter.project_id.clone(),
                name: name.to_owned(),
                description: planned.description.trim().to_owned(),
                arc_start: target_arc,
                arc_end: target_arc + planned.arc_span.max(1) - 1,
                explored: false,
                explored_chapter: None,
                mysteries: planned.mysteries,
            };
            self.store.upsert_location(&location).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryTracker for WorldTracker {
    fn name(&self) -> &'static str {
        "world"
    }

    async fn on_chapter_committed(&self, chapter: &CommittedChapter) -> Result<(), TrackerError> {
        let mut locations = self.store.list_locations(&chapter.project_id).await?;
        self.mark_explored(chapter, &mut locations).await?;

        let arc = arc_index(chapter.number);
        let (_, arc_end) = arc_bounds(arc);
        let next_arc_planned = locations.iter().any(|l| !l.explored && l.arc_start > arc);
        if chapter.number == arc_end && !chapter.terminal_arc && !next_arc_planned {
            self.plan_locations(chapter, arc + 1, &locations).await?;
        }
        Ok(())
    }

    async fn context_fragment(
        &self,
        query: &FragmentQuery<'_>,
    ) -> Result<Option<String>, TrackerError> {
        let arc = arc_index(query.chapter);
        let locations = self.store.list_locations(&query.project.id).await?;
        let explored: Vec<&LocationBible> =
            locations.iter().filter(|l| l.explored && l.relevant_to_arc(arc)).collect();
        let opening: Vec<&LocationBible> =
            locations.iter().filter(|l| !l.explored && l.relevant_to_arc(arc)).collect();
        let locked: Vec<&str> =
            locations.iter().filter(|l| !l.explored).map(|l| l.name.as_str()).collect();
        if explored.is_empty() && locked.is_empty() {
            return Ok(None);
        }

        let mut out = String::from("WORLD:\n");
        for location in explored {
            let _ = write!(out, "- {}", location.name);
            if !location.description.is_empty() {
                let _ = write!(out, ": {}", location.description);
            }
            if !location.mysteries.is_empty() {
                let _ = write!(out, " (unsolved: {})", location.mysteries.join("; "));
            }
            out.push('\n');
        }
        if !opening.is_empty() {
            let names: Vec<&str> = opening.iter().map(|l| l.name.as_str()).collect();
            let _ = writeln!(
                out,
                "May be opened this arc, only as a planned scene setting: {}",
                names.join(", ")
            );
        }
        if !locked.is_empty() {
            let _ = writeln!(out, "DO NOT reference yet (unexplored): {}", locked.join(", "));
        }
        Ok(Some(out))
    }
}
