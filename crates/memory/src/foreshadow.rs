//! Foreshadowing Planner: hint lifecycle and planting/payoff guidance.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use novelmill_core::constants::{FORESHADOW_PAYOFF_GRACE, FORESHADOW_PLANT_GRACE, FORESHADOW_WINDOW};
use novelmill_core::text::contains_word;
use novelmill_core::{ForeshadowingHint, HintStatus};
use novelmill_llm::CompletionProvider;
use novelmill_storage::NarrativeStore;
use serde::Deserialize;

use crate::error::TrackerError;
use crate::structured::ask;
use crate::tracker::{CommittedChapter, FragmentQuery, MemoryTracker};

/// Below this many live hints the planner asks for new ones.
const MIN_ACTIVE_HINTS: usize = 3;
const MAX_NEW_HINTS: usize = 3;
const FRAGMENT_LIMIT: usize = 5;

fn within(chapter: u32, target: u32) -> bool {
    chapter.abs_diff(target) <= FORESHADOW_WINDOW
}

/// Whether the chapter text visibly echoes the hint's distinctive words.
fn mentions(body: &str, hint_text: &str) -> bool {
    let mut keywords: Vec<String> = hint_text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 5)
        .map(str::to_lowercase)
        .collect();
    keywords.sort();
    keywords.dedup();
    if keywords.is_empty() {
        return false;
    }
    let hits = keywords.iter().filter(|w| contains_word(body, w)).count();
    hits >= 2.min(keywords.len()) && hits * 2 >= keywords.len()
}

/// Next status of `hint` after `chapter` is committed, or `None` when unchanged.
///
/// Transitions only move forward: planned to planted to paid off, or to
/// abandoned once a target lapses past its grace period.
#[must_use]
pub fn advance_hint(hint: &ForeshadowingHint, chapter: u32, body: &str) -> Option<HintStatus> {
    let mut status = hint.status;
    if status == HintStatus::Planned {
        if within(chapter, hint.plant_chapter)
            || (chapter > hint.plant_chapter
                && chapter <= hint.plant_chapter + FORESHADOW_PLANT_GRACE
                && mentions(body, &hint.text))
        {
            status = HintStatus::Planted;
        } else if chapter > hint.plant_chapter + FORESHADOW_PLANT_GRACE {
            status = HintStatus::Abandoned;
        }
    } else if status == HintStatus::Planted {
        if within(chapter, hint.payoff_chapter)
            || (chapter > hint.payoff_chapter
                && chapter <= hint.payoff_chapter + FORESHADOW_PAYOFF_GRACE
                && mentions(body, &hint.text))
        {
            status = HintStatus::PaidOff;
        }
    }
    if status == HintStatus::Planted && chapter > hint.payoff_chapter + FORESHADOW_PAYOFF_GRACE {
        status = HintStatus::Abandoned;
    }
    (status != hint.status).then_some(status)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HintPlan {
    hints: Vec<PlannedHint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlannedHint {
    text: String,
    plant_in: u32,
    payoff_in: u32,
}

fn planning_prompt(chapter: &CommittedChapter, live: &[&ForeshadowingHint], wanted: usize) -> String {
    let live: Vec<String> = live.iter().map(|h| format!("- {} ({})", h.text, h.status.as_str())).collect();
    format!(
        r#"Plan foreshadowing for a serialized novel. Chapter {number} was just written; protagonist: {protagonist}.

LIVE HINTS:
{live}

LATEST CHAPTER (excerpt):
{excerpt}

Propose {wanted} new hints: small details planted now that pay off later.
Return JSON:
{{"hints": [{{"text": "the concrete detail to plant", "plant_in": 2, "payoff_in": 25}}]}}
plant_in counts chapters from now; payoff_in counts chapters after planting."#,
        number = chapter.number,
        protagonist = chapter.protagonist,
        live = if live.is_empty() { "none".to_owned() } else { live.join("\n") },
        excerpt = novelmill_core::text::truncate(&chapter.body, 3000),
    )
}

pub struct ForeshadowPlanner {
    store: Arc<dyn NarrativeStore>,
    llm: Arc<dyn CompletionProvider>,
}

impl ForeshadowPlanner {
    #[must_use]
    pub fn new(store: Arc<dyn NarrativeStore>, llm: Arc<dyn CompletionProvider>) -> Self {
        Self { store, llm }
    }

    async fn plan_new_hints(
        &self,
        chapter: &CommittedChapter,
        live: &[&ForeshadowingHint],
    ) -> Result<(), TrackerError> {
        let wanted = MAX_NEW_HINTS.min(MIN_ACTIVE_HINTS + 1 - live.len());
        let prompt = planning_prompt(chapter, live, wanted);
        let plan: HintPlan = ask(self.llm.as_ref(), prompt, 1200).await?;
        for planned in plan.hints.into_iter().filter(|h| !h.text.trim().is_empty()).take(wanted) {
            let plant_chapter = chapter.number + planned.plant_in.max(1);
            let hint = ForeshadowingHint {
                id: uuid::Uuid::new_v4().to_string(),
                project_id: chapter.project_id.clone(),
                text: planned.text.trim().to_owned(),
                plant_chapter,
                payoff_chapter: plant_chapter + planned.payoff_in.max(FORESHADOW_WINDOW * 2 + 1),
                status: HintStatus::Planned,
                status_chapter: Some(chapter.number),
            };
            self.store.upsert_hint(&hint).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryTracker for ForeshadowPlanner {
    fn name(&self) -> &'static str {
        "foreshadow"
    }

    async fn on_chapter_committed(&self, chapter: &CommittedChapter) -> Result<(), TrackerError> {
        let mut hints = self.store.list_hints(&chapter.project_id).await?;
        for hint in hints.iter_mut().filter(|h| !h.status.is_terminal()) {
            if let Some(next) = advance_hint(hint, chapter.number, &chapter.body) {
                tracing::debug!(project = %chapter.project_id, hint = %hint.id, from = hint.status.as_str(), to = next.as_str(), "hint transition");
                hint.status = next;
                hint.status_chapter = Some(chapter.number);
                self.store.upsert_hint(hint).await?;
            }
        }

        let live: Vec<&ForeshadowingHint> = hints.iter().filter(|h| !h.status.is_terminal()).collect();
        if live.len() < MIN_ACTIVE_HINTS && !chapter.terminal_arc {
            self.plan_new_hints(chapter, &live).await?;
        }
        Ok(())
    }

    async fn context_fragment(
        &self,
        query: &FragmentQuery<'_>,
    ) -> Result<Option<String>, TrackerError> {
        let chapter = query.chapter;
        let hints = self.store.list_hints(&query.project.id).await?;
        let mut plant = Vec::new();
        let mut payoff = Vec::new();
        let mut keep = Vec::new();
        for hint in hints.iter().filter(|h| !h.status.is_terminal()) {
            match hint.status {
                HintStatus::Planned if within(chapter, hint.plant_chapter) || chapter > hint.plant_chapter => {
                    plant.push(hint);
                },
                HintStatus::Planted if within(chapter, hint.payoff_chapter) || chapter > hint.payoff_chapter => {
                    payoff.push(hint);
                },
                HintStatus::Planted => keep.push(hint),
                _ => {},
            }
        }
        if plant.is_empty() && payoff.is_empty() && keep.is_empty() {
            return Ok(None);
        }

        let mut out = String::from("FORESHADOWING:\n");
        for hint in plant.iter().take(FRAGMENT_LIMIT) {
            let _ = writeln!(out, "- PLANT subtly in this chapter: {}", hint.text);
        }
        for hint in payoff.iter().take(FRAGMENT_LIMIT) {
            let _ = writeln!(
                out,
                "- PAY OFF now (planted in chapter {}): {}",
                hint.status_chapter.unwrap_or(hint.plant_chapter),
                hint.text
            );
        }
        for hint in keep.iter().take(FRAGMENT_LIMIT) {
            let _ = writeln!(
                out,
                "- Already planted, keep consistent and do not resolve before chapter {}: {}",
                hint.payoff_chapter.saturating_sub(FORESHADOW_WINDOW),
                hint.text
            );
        }
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use novelmill_llm::{ScriptedProvider, ScriptedReply};
    use novelmill_storage::ForeshadowStore;

    use super::*;
    use crate::test_support::{committed, dyn_store, llm, project, store};

    fn hint(id: &str, plant: u32, payoff: u32, status: HintStatus) -> ForeshadowingHint {
        ForeshadowingHint {
            id: id.to_owned(),
            project_id: "p1".to_owned(),
            text: "a cracked bronze mirror".to_owned(),
            plant_chapter: plant,
            payoff_chapter: payoff,
            status,
            status_chapter: None,
        }
    }

    #[test]
    fn test_lapsed_hints_never_stay_open_past_grace() {
        for plant in 1..30u32 {
            for payoff in plant..plant + 40 {
                for chapter in 1..120u32 {
                    for start in [HintStatus::Planned, HintStatus::Planted] {
                        let h = hint("h", plant, payoff, start);
                        let next = advance_hint(&h, chapter, "nothing relevant").unwrap_or(start);
                        assert!(next.rank() >= start.rank());
                        if next == HintStatus::Planned {
                            assert!(chapter <= plant + FORESHADOW_PLANT_GRACE);
                        }
                        if next == HintStatus::Planted {
                            assert!(chapter <= payoff + FORESHADOW_PAYOFF_GRACE);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_windowed_and_late_transitions() {
        let planned = hint("h", 10, 30, HintStatus::Planned);
        assert_eq!(advance_hint(&planned, 8, ""), Some(HintStatus::Planted));
        assert_eq!(advance_hint(&planned, 7, ""), None);
        assert_eq!(advance_hint(&planned, 15, ""), None);
        assert_eq!(
            advance_hint(&planned, 15, "The cracked mirror was bronze and old."),
            Some(HintStatus::Planted)
        );
        assert_eq!(advance_hint(&planned, 21, ""), Some(HintStatus::Abandoned));

        let planted = hint("h", 10, 30, HintStatus::Planted);
        assert_eq!(advance_hint(&planted, 32, ""), Some(HintStatus::PaidOff));
        assert_eq!(advance_hint(&planted, 45, ""), None);
        assert_eq!(advance_hint(&planted, 51, ""), Some(HintStatus::Abandoned));
    }

    #[tokio::test]
    async fn test_commit_updates_lifecycle_and_tops_up_hints() {
        let store = store();
        store.upsert_hint(&hint("due", 29, 45, HintStatus::Planned)).await.unwrap();
        store.upsert_hint(&hint("stale", 1, 3, HintStatus::Planted)).await.unwrap();
        let provider = llm(ScriptedProvider::new().on(
            "Plan foreshadowing",
            r#"{"hints": [{"text": "the sealed letter", "plant_in": 2, "payoff_in": 30}, {"text": "", "plant_in": 1, "payoff_in": 1}]}"#,
        ));
        let planner = ForeshadowPlanner::new(dyn_store(&store), provider);

        planner.on_chapter_committed(&committed(30, "Lin read.", None)).await.unwrap();

        let hints = store.list_hints("p1").await.unwrap();
        let status = |id: &str| hints.iter().find(|h| h.id == id).map(|h| h.status);
        assert_eq!(status("due"), Some(HintStatus::Planted));
        assert_eq!(status("stale"), Some(HintStatus::Abandoned));
        let new = hints.iter().find(|h| h.text == "the sealed letter").unwrap();
        assert_eq!((new.plant_chapter, new.payoff_chapter, new.status), (32, 62, HintStatus::Planned));
        assert_eq!(hints.len(), 3);
    }

    #[tokio::test]
    async fn test_planning_failure_surfaces_as_tracker_error() {
        let store = store();
        let planner = ForeshadowPlanner::new(
            dyn_store(&store),
            llm(ScriptedProvider::new().with_fallback(ScriptedReply::status(503))),
        );
        let err = planner.on_chapter_committed(&committed(2, "text", None)).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_fragment_groups_plant_and_payoff() {
        let store = store();
        store.upsert_hint(&hint("a", 12, 40, HintStatus::Planned)).await.unwrap();
        let mut planted = hint("b", 3, 13, HintStatus::Planted);
        planted.text = "the bell that never rings".to_owned();
        store.upsert_hint(&planted).await.unwrap();
        let mut later = hint("c", 5, 60, HintStatus::Planted);
        later.text = "a debt to the ferryman".to_owned();
        store.upsert_hint(&later).await.unwrap();
        store.upsert_hint(&hint("d", 1, 2, HintStatus::PaidOff)).await.unwrap();

        let planner = ForeshadowPlanner::new(dyn_store(&store), llm(ScriptedProvider::new()));
        let project = project();
        let fragment = planner
            .context_fragment(&FragmentQuery { project: &project, chapter: 12, cast: &[] })
            .await
            .unwrap()
            .unwrap();
        assert!(fragment.contains("PLANT subtly in this chapter: a cracked bronze mirror"));
        assert!(fragment.contains("PAY OFF now (planted in chapter 3): the bell that never rings"));
        assert!(fragment.contains("do not resolve before chapter 58: a debt to the ferryman"));
    }
}
