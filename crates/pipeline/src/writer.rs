//! Writer step: outline to prose, with one continuation pass for short drafts.

use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

use novelmill_core::constants::CONTINUATION_TAIL_CHARS;
use novelmill_core::text::{tail, word_count};
use novelmill_core::{Outline, Project};
use novelmill_llm::{CompletionProvider, CompletionRequest};
use regex::Regex;

use crate::context::AssembledContext;
use crate::error::PipelineError;

const WRITER_SYSTEM: &str = "You are the lead writer of a serialized web novel. Write vivid, \
readable chapter prose in the established voice. Output only the chapter text: no headings, no \
notes, no word counts.";

#[allow(clippy::unwrap_used, reason = "static regex pattern is compile-time validated")]
static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(#+\s.*|\**\s*chapter\s+\d+\b.*|\**\s*title\s*:.*)$").unwrap()
});
#[allow(clippy::unwrap_used, reason = "static regex pattern is compile-time validated")]
static TRAILER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[(\[]?\s*(word count|end of chapter|to be continued|the end\]|end\])").unwrap()
});
#[allow(clippy::unwrap_used, reason = "static regex pattern is compile-time validated")]
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strip fences, leading headings and trailing notes from model prose.
#[must_use]
pub fn clean_prose(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.lines().filter(|l| !l.trim_start().starts_with("```")).collect();
    while lines.first().is_some_and(|l| l.trim().is_empty() || HEADING.is_match(l.trim())) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| {
        let l = l.trim();
        l.is_empty() || TRAILER.is_match(l) || l == "---" || l == "***"
    }) {
        lines.pop();
    }
    BLANK_RUNS.replace_all(lines.join("\n").trim(), "\n\n").into_owned()
}

/// Prose for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub body: String,
    pub word_count: usize,
    /// Whether a continuation call was appended.
    pub continued: bool,
}

pub struct Writer {
    llm: Arc<dyn CompletionProvider>,
}

impl Writer {
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self { llm }
    }

    pub async fn write(
        &self,
        project: &Project,
        context: &AssembledContext,
        outline: &Outline,
        target_words: u32,
        feedback: &[String],
    ) -> Result<Draft, PipelineError> {
        let chapter = context.chapter;
        let request = CompletionRequest::new(prose_prompt(project, context, outline, target_words, feedback))
            .with_system(WRITER_SYSTEM)
            .with_temperature(0.85)
            .with_max_tokens(output_budget(target_words));
        let response = self.llm.complete(&request).await?;
        let mut body = clean_prose(&response.text);
        if body.is_empty() {
            return Err(PipelineError::failed(chapter, "writer returned no prose"));
        }

        let mut continued = false;
        let written = word_count(&body);
        if (written as u64) * 10 < u64::from(target_words) * 7 {
            tracing::info!(chapter, written, target_words, "draft short, requesting continuation");
            let remaining = (target_words as usize).saturating_sub(written);
            let request = CompletionRequest::new(continuation_prompt(outline, &body, remaining, chapter))
                .with_system(WRITER_SYSTEM)
                .with_temperature(0.85)
                .with_max_tokens(output_budget(u32::try_from(remaining).unwrap_or(target_words)));
            match self.llm.complete(&request).await {
                Ok(more) => {
                    let more = clean_prose(&more.text);
                    if !more.is_empty() {
                        body.push_str("\n\n");
                        body.push_str(&more);
                        continued = true;
                    }
                },
                Err(e) => {
                    tracing::warn!(chapter, error = %e, "continuation failed, keeping short draft");
                },
            }
        }

        let word_count = word_count(&body);
        tracing::debug!(chapter, word_count, continued, "prose drafted");
        Ok(Draft { body, word_count, continued })
    }
}

/// Roughly two tokens per target word, bounded.
fn output_budget(words: u32) -> u32 {
    words.saturating_mul(2).clamp(1024, 16_000)
}

fn voice_guide(project: &Project, context: &AssembledContext, outline: &Outline) -> String {
    let mut out = String::new();
    for name in outline.cast() {
        let known = context.roster.alive.iter().find(|s| s.name.eq_ignore_ascii_case(&name));
        let _ = write!(out, "- {name}: ");
        if name.eq_ignore_ascii_case(&project.protagonist) {
            out.push_str("point-of-view character; interior thoughts allowed");
        } else {
            out.push_str("distinct vocabulary and rhythm; never sounds like the protagonist");
        }
        if let Some(state) = known.filter(|s| !s.power.is_empty()) {
            let _ = write!(out, "; speaks like someone at {}", state.power);
        }
        out.push('\n');
    }
    out
}

fn scene_plan(outline: &Outline) -> String {
    let mut out = String::new();
    for (i, scene) in outline.scenes.iter().enumerate() {
        let (s_lo, s_hi) = scene.speed.sentence_band();
        let (d_lo, d_hi) = scene.speed.dialogue_band();
        let _ = writeln!(
            out,
            "{n}. [{speed}: {s_lo}-{s_hi} words per sentence, {d_lo}-{d_hi}% dialogue, ~{words} words] {setting}, with {cast}.",
            n = i + 1,
            speed = scene.speed.as_str(),
            words = scene.target_words,
            setting = if scene.setting.is_empty() { "same place" } else { scene.setting.as_str() },
            cast = scene.participants.join(", "),
        );
        let _ = writeln!(out, "   Goal: {}. Conflict: {}.", scene.goal, scene.conflict);
        if !scene.resolution.is_empty() {
            let _ = writeln!(out, "   Lands on: {}.", scene.resolution);
        }
        if scene.comedic {
            out.push_str("   Include a light comedic beat here.\n");
        }
    }
    out
}

fn prose_prompt(
    project: &Project,
    context: &AssembledContext,
    outline: &Outline,
    target_words: u32,
    feedback: &[String],
) -> String {
    let mut prompt = context.text.clone();
    let _ = write!(
        prompt,
        "Write chapter {chapter} of \"{title}\": \"{chapter_title}\", about {target_words} words.\n\
         Emotional arc: {arc}\n\nSCENES:\n{scenes}\nVOICES:\n{voices}",
        chapter = context.chapter,
        title = project.title,
        chapter_title = outline.title,
        arc = outline.emotional_arc,
        scenes = scene_plan(outline),
        voices = voice_guide(project, context, outline),
    );
    if outline.hook.is_empty() {
        prompt.push_str("\nClose the chapter cleanly.\n");
    } else {
        let _ = writeln!(prompt, "\nEnd on this hook, in the last lines: {}", outline.hook);
    }
    if !feedback.is_empty() {
        let _ = write!(prompt, "\nREVISION NOTES (all must be addressed):\n- {}\n", feedback.join("\n- "));
    }
    prompt
}

fn continuation_prompt(outline: &Outline, body: &str, remaining: usize, chapter: u32) -> String {
    format!(
        "The draft of chapter {chapter} stops early. Continue it seamlessly for about {remaining} \
         more words, covering whatever scenes below are not finished, and end on the planned hook.\n\n\
         SCENES:\n{scenes}\nHOOK: {hook}\n\nCONTINUE FROM HERE (do not repeat any of it):\n{tail}",
        scenes = scene_plan(outline),
        hook = outline.hook,
        tail = tail(body, CONTINUATION_TAIL_CHARS),
    )
}

#[cfg(test)]
mod tests {
    use novelmill_core::{Scene, SceneSpeed};
    use novelmill_llm::{ScriptedProvider, ScriptedReply};

    use super::*;
    use crate::test_support::{context, project, prose};

    fn outline() -> Outline {
        Outline {
            title: "Ash".to_owned(),
            scenes: vec![
                Scene {
                    setting: "Azure Peak".to_owned(),
                    participants: vec!["Lin".to_owned(), "Mara".to_owned()],
                    goal: "reach the gate".to_owned(),
                    conflict: "the gatekeeper".to_owned(),
                    target_words: 1400,
                    speed: SceneSpeed::Fast,
                    ..Scene::default()
                },
                Scene {
                    setting: "Tea house".to_owned(),
                    participants: vec!["Lin".to_owned()],
                    goal: "rest".to_owned(),
                    conflict: "a nosy cook".to_owned(),
                    target_words: 1400,
                    speed: SceneSpeed::Slow,
                    comedic: true,
                    ..Scene::default()
                },
            ],
            emotional_arc: "tension to relief".to_owned(),
            hook: "The letter bears a dead man's seal.".to_owned(),
            hook_technique: "reveal".to_owned(),
        }
    }

    #[test]
    fn test_clean_prose() {
        let raw = "```\n# Chapter 12: Ash\n\nLin woke.\n\n\n\nThe bell rang.\n\n---\n(Word count: 2800)\n```";
        assert_eq!(clean_prose(raw), "Lin woke.\n\nThe bell rang.");
        assert_eq!(clean_prose("**Chapter 3**\nText."), "Text.");
        assert_eq!(clean_prose("  \n"), "");
    }

    #[tokio::test]
    async fn test_short_draft_gets_exactly_one_continuation() {
        let llm = Arc::new(
            ScriptedProvider::new()
                .on("CONTINUE FROM HERE", prose(700))
                .on("Write chapter", format!("Chapter 9\n\n{}", prose(1200))),
        );
        let draft =
            Writer::new(llm.clone()).write(&project(), &context(9), &outline(), 2800, &[]).await.unwrap();

        assert!(draft.continued);
        assert_eq!(draft.word_count, 1900);
        assert_eq!(llm.calls_matching("CONTINUE FROM HERE"), 1);
        assert_eq!(llm.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_long_enough_draft_is_not_continued() {
        let llm = Arc::new(
            ScriptedProvider::new()
                .on("CONTINUE FROM HERE", prose(700))
                .on("Write chapter", prose(2000)),
        );
        let draft =
            Writer::new(llm.clone()).write(&project(), &context(9), &outline(), 2800, &[]).await.unwrap();
        assert!(!draft.continued);
        assert_eq!(draft.word_count, 2000);
        assert_eq!(llm.calls_matching("CONTINUE FROM HERE"), 0);
    }

    #[tokio::test]
    async fn test_prompt_carries_pacing_voices_and_feedback() {
        let llm = Arc::new(ScriptedProvider::new().with_fallback(ScriptedReply::text(prose(2500))));
        let feedback = vec!["Cut the repeated breath beats.".to_owned()];
        Writer::new(llm.clone()).write(&project(), &context(9), &outline(), 2800, &feedback).await.unwrap();

        let prompt = &llm.calls()[0].prompt;
        assert!(prompt.contains("[fast: 6-12 words per sentence, 30-50% dialogue, ~1400 words] Azure Peak"));
        assert!(prompt.contains("Include a light comedic beat here."));
        assert!(prompt.contains("- Lin: point-of-view character"));
        assert!(prompt.contains("- Mara: distinct vocabulary"));
        assert!(prompt.contains("End on this hook, in the last lines: The letter bears a dead man's seal."));
        assert!(prompt.contains("- Cut the repeated breath beats."));
    }

    #[tokio::test]
    async fn test_empty_prose_is_a_named_failure() {
        let llm = Arc::new(ScriptedProvider::new().on("Write chapter", "```\n```"));
        let err = Writer::new(llm).write(&project(), &context(9), &outline(), 2800, &[]).await.unwrap_err();
        assert!(matches!(err, PipelineError::ChapterGenerationFailed { chapter: 9, .. }));
    }
}
