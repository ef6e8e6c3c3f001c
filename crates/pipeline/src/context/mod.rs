//! Context assembly: one bounded prompt block per chapter.

mod blacklist;
mod sections;

use std::fmt::Write as _;
use std::sync::Arc;

use futures_util::future::join_all;
use novelmill_core::text::{contains_word, paragraphs, tail};
use novelmill_core::{ArcPlan, Chapter, ChapterSummary, ChunkMatch, Project, Synopsis};
use novelmill_memory::{FragmentQuery, MemorySuite, Roster};
use novelmill_storage::NarrativeStore;

pub use blacklist::Blacklist;
pub use sections::{Section, SectionKind, fit_to_budget};

use crate::config::GenerationConfig;
use crate::error::PipelineError;

/// Chapters scanned for the anti-repetition lists.
const BLACKLIST_WINDOW: usize = 10;

/// Assembled prompt context plus the structured state later steps check against.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub chapter: u32,
    pub text: String,
    pub bridge: Option<ChapterSummary>,
    pub roster: Roster,
    pub arc_plan: ArcPlan,
    /// Characters expected on stage, protagonist first.
    pub cast: Vec<String>,
    pub unexplored: Vec<String>,
    pub blacklist: Blacklist,
    pub trimmed: Vec<SectionKind>,
}

impl AssembledContext {
    #[must_use]
    pub fn brief(&self) -> Option<&str> {
        self.arc_plan.brief_for(self.chapter)
    }
}

pub struct ContextAssembler {
    store: Arc<dyn NarrativeStore>,
    memory: MemorySuite,
    config: GenerationConfig,
}

impl ContextAssembler {
    #[must_use]
    pub fn new(store: Arc<dyn NarrativeStore>, memory: MemorySuite, config: GenerationConfig) -> Self {
        Self { store, memory, config }
    }

    pub async fn assemble(
        &self,
        project: &Project,
        chapter: u32,
    ) -> Result<AssembledContext, PipelineError> {
        let window = self.config.recent_chapters.max(BLACKLIST_WINDOW);
        let recent = self.store.recent_chapters(&project.id, chapter, window).await?;
        let bridge = self.memory.plot.bridge(&project.id, chapter).await?;
        let roster = self.memory.characters.roster(&project.id, chapter).await?;
        let arc_plan = self.memory.plot.ensure_arc_plan(project, chapter).await?;
        let synopsis = self.memory.plot.synopsis(&project.id).await?;
        let unexplored = self.memory.world.unexplored_names(&project.id).await.unwrap_or_else(|e| {
            tracing::warn!(project = %project.id, chapter, error = %e, "unexplored locations unavailable");
            Vec::new()
        });

        let brief = arc_plan.brief_for(chapter).unwrap_or_default();
        let cast = expected_cast(project, &roster, brief, bridge.as_ref());
        let fragments = self.fragments(project, chapter, &cast).await;
        let query = semantic_query(brief, bridge.as_ref());
        let hits = self.memory.semantic.retrieve(&project.id, chapter, &query).await.unwrap_or_else(|e| {
            tracing::warn!(project = %project.id, chapter, error = %e, "semantic retrieval failed");
            Vec::new()
        });

        let verbatim_from = recent.len().saturating_sub(self.config.recent_chapters);
        let blacklist = Blacklist::from_chapters(&recent);
        let previous = recent.last().filter(|c| c.number + 1 == chapter);

        let mut sections = Vec::with_capacity(10);
        push(&mut sections, SectionKind::Vision, vision_section(project));
        sections.push(Section::new(
            SectionKind::Bridge,
            bridge_section(project, chapter, bridge.as_ref(), previous),
        ));
        let roster_text =
            if roster.is_empty() { "No tracked characters yet.".to_owned() } else { roster.render() };
        sections.push(Section::new(SectionKind::Roster, roster_text));
        push(&mut sections, SectionKind::Memory, fragments.join("\n\n"));
        push(&mut sections, SectionKind::LongRange, long_range_section(&hits));
        push(&mut sections, SectionKind::StoryBible, project.story_bible.clone());
        push(&mut sections, SectionKind::Synopsis, synopsis.as_ref().map(synopsis_section).unwrap_or_default());
        push(
            &mut sections,
            SectionKind::RecentChapters,
            recent_section(recent.get(verbatim_from..).unwrap_or_default()),
        );
        push(&mut sections, SectionKind::ArcPlan, arc_section(&arc_plan, chapter));
        push(&mut sections, SectionKind::Blacklist, blacklist.render());

        let (text, trimmed) = fit_to_budget(sections, self.config.context_budget_chars);
        tracing::debug!(
            project = %project.id,
            chapter,
            chars = text.len(),
            budget = self.config.context_budget_chars,
            semantic_hits = hits.len(),
            trimmed = ?trimmed,
            "context assembled"
        );

        Ok(AssembledContext { chapter, text, bridge, roster, arc_plan, cast, unexplored, blacklist, trimmed })
    }

    async fn fragments(&self, project: &Project, chapter: u32, cast: &[String]) -> Vec<String> {
        let query = FragmentQuery { project, chapter, cast };
        let trackers = self.memory.trackers();
        let results = join_all(trackers.iter().map(|t| t.context_fragment(&query))).await;
        trackers
            .iter()
            .zip(results)
            .filter_map(|(tracker, result)| match result {
                Ok(fragment) => fragment.filter(|f| !f.trim().is_empty()),
                Err(e) => {
                    tracing::warn!(tracker = tracker.name(), project = %project.id, chapter, error = %e, "context fragment failed");
                    None
                },
            })
            .collect()
    }
}

fn push(sections: &mut Vec<Section>, kind: SectionKind, body: String) {
    if !body.trim().is_empty() {
        sections.push(Section::new(kind, body));
    }
}

/// Protagonist plus living characters the brief or bridge names.
fn expected_cast(
    project: &Project,
    roster: &Roster,
    brief: &str,
    bridge: Option<&ChapterSummary>,
) -> Vec<String> {
    let mut cast = vec![project.protagonist.clone()];
    let hints = [
        brief,
        bridge.map_or("", |b| b.unresolved_hook.as_str()),
        bridge.map_or("", |b| b.summary.as_str()),
    ];
    for state in roster.alive.iter().chain(&roster.missing) {
        let named = hints.iter().any(|h| contains_word(h, &state.name));
        if named && !cast.iter().any(|c| c.eq_ignore_ascii_case(&state.name)) {
            cast.push(state.name.clone());
        }
    }
    cast
}

fn semantic_query(brief: &str, bridge: Option<&ChapterSummary>) -> String {
    let mut query = brief.to_owned();
    if let Some(bridge) = bridge {
        for part in [&bridge.unresolved_hook, &bridge.protagonist_state] {
            if !part.trim().is_empty() {
                query.push(' ');
                query.push_str(part);
            }
        }
    }
    query
}

fn vision_section(project: &Project) -> String {
    let mut out = format!("Title: {}", project.title);
    if !project.genre.is_empty() {
        let _ = write!(out, " ({})", project.genre);
    }
    let _ = write!(out, "\nProtagonist: {}", project.protagonist);
    if !project.vision.trim().is_empty() {
        let _ = write!(out, "\n{}", project.vision.trim());
    }
    out
}

fn bridge_section(
    project: &Project,
    chapter: u32,
    bridge: Option<&ChapterSummary>,
    previous: Option<&Chapter>,
) -> String {
    if chapter <= 1 {
        return format!(
            "This is the opening chapter. Establish {} and the central conflict, and end on an open question.",
            project.protagonist
        );
    }
    match (bridge, previous) {
        (Some(bridge), _) => {
            let mut out = String::new();
            if bridge.unresolved_hook.trim().is_empty() {
                let _ = writeln!(out, "Chapter {} closed without an open hook.", bridge.number);
            } else {
                let _ = writeln!(out, "Chapter {} ended on: {}", bridge.number, bridge.unresolved_hook.trim());
                out.push_str("Open this chapter by directly continuing and resolving that hook.\n");
            }
            if !bridge.protagonist_state.trim().is_empty() {
                let _ = writeln!(out, "{} right now: {}", project.protagonist, bridge.protagonist_state.trim());
            }
            out
        },
        // Summary missing: carry the raw ending instead.
        (None, Some(previous)) => {
            let ending = paragraphs(&previous.body).last().copied().unwrap_or_default();
            format!(
                "Chapter {} ended with:\n{}\nOpen this chapter by continuing directly from that moment.",
                previous.number,
                tail(ending, 1200)
            )
        },
        (None, None) => format!(
            "No record of chapter {}. Open with {} in motion and re-anchor the reader quickly.",
            chapter - 1,
            project.protagonist
        ),
    }
}

fn long_range_section(hits: &[ChunkMatch]) -> String {
    let mut out = String::new();
    for hit in hits {
        let _ = writeln!(out, "[chapter {}, {}] {}", hit.chapter, hit.kind.as_str(), hit.text.trim());
    }
    out
}

fn synopsis_section(synopsis: &Synopsis) -> String {
    let mut out = synopsis.summary.trim().to_owned();
    if !synopsis.protagonist_state.is_empty() {
        let _ = write!(out, "\nProtagonist: {}", synopsis.protagonist_state);
    }
    if !synopsis.allies.is_empty() {
        let _ = write!(out, "\nAllies: {}", synopsis.allies.join(", "));
    }
    if !synopsis.enemies.is_empty() {
        let _ = write!(out, "\nEnemies: {}", synopsis.enemies.join(", "));
    }
    if !synopsis.open_threads.is_empty() {
        let _ = write!(out, "\nOpen threads: {}", synopsis.open_threads.join("; "));
    }
    out
}

fn recent_section(chapters: &[Chapter]) -> String {
    let mut out = String::new();
    for chapter in chapters {
        let _ = write!(out, "### Chapter {}: {}\n{}\n\n", chapter.number, chapter.title, chapter.body.trim());
    }
    out
}

fn arc_section(plan: &ArcPlan, chapter: u32) -> String {
    let mut out = format!(
        "Arc {} (chapters {}-{}): {}",
        plan.arc_index + 1,
        plan.start_chapter,
        plan.end_chapter,
        plan.theme
    );
    if !plan.goal.is_empty() {
        let _ = write!(out, "\nArc goal: {}", plan.goal);
    }
    if let Some(brief) = plan.brief_for(chapter) {
        let _ = write!(out, "\nThis chapter ({chapter}): {brief}");
    }
    if !plan.thread_obligations.is_empty() {
        let _ = write!(out, "\nThreads owed this arc: {}", plan.thread_obligations.join("; "));
    }
    out
}
