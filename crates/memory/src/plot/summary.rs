//! Chapter summary (bridge) and rolling synopsis.

use chrono::Utc;
use novelmill_core::constants::SYNOPSIS_REFRESH_INTERVAL;
use novelmill_core::text::{sentences, truncate};
use novelmill_core::{ChapterSummary, PlotThread, Synopsis};
use serde::Deserialize;

use crate::tracker::CommittedChapter;

/// Model record describing one committed chapter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SummaryRecord {
    pub summary: String,
    pub protagonist_state: String,
    pub unresolved_hook: String,
    pub threads_touched: Vec<String>,
    pub new_threads: Vec<NewThread>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct NewThread {
    pub title: String,
    pub description: String,
    pub related_characters: Vec<String>,
    /// Chapters from now by which the thread should pay off.
    pub payoff_in: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SynopsisRecord {
    pub summary: String,
    pub protagonist_state: String,
    pub allies: Vec<String>,
    pub enemies: Vec<String>,
    pub open_threads: Vec<String>,
}

pub(crate) fn summary_prompt(chapter: &CommittedChapter, threads: &[PlotThread]) -> String {
    let thread_titles: Vec<&str> =
        threads.iter().filter(|t| t.status.is_active()).map(|t| t.title.as_str()).collect();
    format!(
        r#"Summarize chapter {number} ("{title}") of the novel. The protagonist is {protagonist}.

Known plot threads: {threads}

Return JSON:
{{
  "summary": "3-5 sentences of what happened",
  "protagonist_state": "where {protagonist} is, condition, immediate goal",
  "unresolved_hook": "the open tension the chapter ends on",
  "threads_touched": ["titles of known threads this chapter advanced"],
  "new_threads": [{{"title": "...", "description": "...", "related_characters": ["..."], "payoff_in": 30}}]
}}

CHAPTER TEXT:
{body}"#,
        number = chapter.number,
        title = chapter.title,
        protagonist = chapter.protagonist,
        threads = if thread_titles.is_empty() { "none".to_owned() } else { thread_titles.join("; ") },
        body = chapter.body,
    )
}

/// Summary record built without the model, from the outline and the prose.
pub(crate) fn fallback_summary(chapter: &CommittedChapter) -> SummaryRecord {
    let sentences = sentences(&chapter.body);
    let summary = chapter
        .outline
        .as_ref()
        .map(|o| {
            o.scenes
                .iter()
                .take(3)
                .map(|s| s.goal.trim())
                .filter(|g| !g.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| sentences.iter().take(3).copied().collect::<Vec<_>>().join(" "));

    SummaryRecord {
        summary,
        protagonist_state: String::new(),
        unresolved_hook: fallback_hook(chapter),
        threads_touched: Vec::new(),
        new_threads: Vec::new(),
    }
}

/// Closing tension from the outline hook, the last scene's conflict, or the last sentence.
fn fallback_hook(chapter: &CommittedChapter) -> String {
    let from_outline = chapter.outline.as_ref().and_then(|o| {
        let hook = o.hook.trim();
        if hook.is_empty() {
            o.scenes.last().map(|s| s.conflict.trim().to_owned()).filter(|c| !c.is_empty())
        } else {
            Some(hook.to_owned())
        }
    });
    from_outline
        .or_else(|| sentences(&chapter.body).last().map(|s| (*s).to_owned()))
        .unwrap_or_else(|| format!("What happens after chapter {}?", chapter.number))
}

/// Persistable summary; the hook is never empty outside the terminal arc.
pub(crate) fn to_chapter_summary(
    chapter: &CommittedChapter,
    mut record: SummaryRecord,
) -> ChapterSummary {
    if record.summary.trim().is_empty() {
        record.summary = fallback_summary(chapter).summary;
    }
    if record.unresolved_hook.trim().is_empty() && !chapter.terminal_arc {
        record.unresolved_hook = fallback_hook(chapter);
    }
    ChapterSummary {
        project_id: chapter.project_id.clone(),
        number: chapter.number,
        summary: record.summary.trim().to_owned(),
        protagonist_state: record.protagonist_state.trim().to_owned(),
        unresolved_hook: record.unresolved_hook.trim().to_owned(),
        created_at: Utc::now(),
    }
}

pub(crate) fn synopsis_due(chapter: u32, existing: Option<&Synopsis>) -> bool {
    existing.is_none() || chapter % SYNOPSIS_REFRESH_INTERVAL == 0
}

pub(crate) fn synopsis_prompt(
    previous: Option<&Synopsis>,
    summaries: &[ChapterSummary],
    protagonist: &str,
) -> String {
    let previous = previous.map_or("none yet", |s| s.summary.as_str());
    let recent: Vec<String> =
        summaries.iter().map(|s| format!("Chapter {}: {}", s.number, s.summary)).collect();
    format!(
        r#"Update the rolling synopsis of a serialized novel whose protagonist is {protagonist}.

PREVIOUS SYNOPSIS:
{previous}

RECENT CHAPTERS:
{recent}

Return JSON:
{{
  "summary": "one or two paragraphs covering the whole story so far",
  "protagonist_state": "current condition, power and goal",
  "allies": ["..."],
  "enemies": ["..."],
  "open_threads": ["unresolved story questions"]
}}"#,
        recent = recent.join("\n"),
    )
}

/// Synopsis assembled from recent summaries when the model is unavailable.
pub(crate) fn fallback_synopsis(
    project_id: &str,
    chapter: u32,
    summaries: &[ChapterSummary],
) -> Synopsis {
    let joined: Vec<&str> = summaries.iter().map(|s| s.summary.as_str()).collect();
    Synopsis {
        project_id: project_id.to_owned(),
        summary: truncate(&joined.join(" "), 4000).to_owned(),
        protagonist_state: summaries.last().map(|s| s.protagonist_state.clone()).unwrap_or_default(),
        as_of_chapter: chapter,
        ..Synopsis::default()
    }
}

pub(crate) fn to_synopsis(project_id: &str, chapter: u32, record: SynopsisRecord) -> Synopsis {
    Synopsis {
        project_id: project_id.to_owned(),
        summary: record.summary,
        protagonist_state: record.protagonist_state,
        allies: record.allies,
        enemies: record.enemies,
        open_threads: record.open_threads,
        as_of_chapter: chapter,
    }
}
