//! Arc planning: theme, per-chapter briefs and thread obligations.

use novelmill_core::{ArcPlan, ChapterBrief, PlotThread, Project, Synopsis, arc_bounds};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ArcRecord {
    pub theme: String,
    pub goal: String,
    pub briefs: Vec<ChapterBrief>,
    pub thread_obligations: Vec<String>,
}

pub(crate) fn arc_prompt(
    project: &Project,
    arc_index: u32,
    synopsis: Option<&Synopsis>,
    threads: &[PlotThread],
) -> String {
    let (start, end) = arc_bounds(arc_index);
    let open: Vec<String> = threads
        .iter()
        .filter(|t| t.status.is_active())
        .map(|t| match t.payoff_deadline {
            Some(d) => format!("- {} ({}, due by chapter {d})", t.title, t.priority.as_str()),
            None => format!("- {} ({})", t.title, t.priority.as_str()),
        })
        .collect();
    let terminal = if project.is_terminal_arc(start) {
        "This is the FINAL arc: resolve the main threads and end the story."
    } else {
        "Leave the arc ending open enough to pull readers into the next arc."
    };
    format!(
        r#"Plan arc {arc_number} (chapters {start}-{end}) of "{title}", a {genre} serial.

VISION:
{vision}

STORY SO FAR:
{synopsis}

OPEN THREADS:
{open}

{terminal}

Return JSON:
{{
  "theme": "short theme tag",
  "goal": "what the protagonist must achieve by chapter {end}",
  "briefs": [{{"chapter": {start}, "brief": "one or two sentences"}}],
  "thread_obligations": ["thread titles this arc must advance or pay off"]
}}
Give one brief for every chapter from {start} to {end}."#,
        arc_number = arc_index + 1,
        title = project.title,
        genre = if project.genre.is_empty() { "web fiction" } else { project.genre.as_str() },
        vision = project.vision,
        synopsis = synopsis.map_or("The story has not started yet.", |s| s.summary.as_str()),
        open = if open.is_empty() { "none".to_owned() } else { open.join("\n") },
    )
}

fn generic_brief(chapter: u32, start: u32, end: u32) -> String {
    if chapter == start {
        "Open the arc: establish the new goal and the obstacle in the way.".to_owned()
    } else if chapter == end {
        "Close the arc: the decisive confrontation and its cost.".to_owned()
    } else if chapter > start + (end - start) * 2 / 3 {
        "Escalate toward the arc climax; stakes rise and allies are tested.".to_owned()
    } else {
        "Develop the arc goal through a complication that forces a choice.".to_owned()
    }
}

/// Build a plan whose briefs cover every chapter of the arc exactly once.
pub(crate) fn normalize_plan(project_id: &str, arc_index: u32, record: ArcRecord) -> ArcPlan {
    let mut plan = ArcPlan::new(project_id, arc_index);
    plan.theme = if record.theme.trim().is_empty() { "progression".to_owned() } else { record.theme };
    plan.goal = record.goal;
    plan.thread_obligations = record.thread_obligations;
    plan.briefs = (plan.start_chapter..=plan.end_chapter)
        .map(|chapter| {
            let brief = record
                .briefs
                .iter()
                .find(|b| b.chapter == chapter && !b.brief.trim().is_empty())
                .map_or_else(
                    || generic_brief(chapter, plan.start_chapter, plan.end_chapter),
                    |b| b.brief.trim().to_owned(),
                );
            ChapterBrief { chapter, brief }
        })
        .collect();
    plan
}

/// Plan used when the model cannot produce one.
pub(crate) fn synthetic_plan(project_id: &str, arc_index: u32, threads: &[PlotThread]) -> ArcPlan {
    let obligations = threads
        .iter()
        .filter(|t| t.status.is_active())
        .filter(|t| t.payoff_deadline.is_some_and(|d| d <= arc_bounds(arc_index).1))
        .map(|t| t.title.clone())
        .collect();
    normalize_plan(
        project_id,
        arc_index,
        ArcRecord { thread_obligations: obligations, ..ArcRecord::default() },
    )
}
