//! Architect step: structured chapter outline plus validation.

use std::sync::Arc;

use novelmill_core::constants::MIN_OUTLINE_SCENES;
use novelmill_core::{Outline, Project, Scene, SceneSpeed, parse_structured};
use novelmill_llm::{CompletionProvider, CompletionRequest};
use serde::Deserialize;
use serde_json::Value;

use crate::context::AssembledContext;
use crate::error::PipelineError;

const ARCHITECT_SYSTEM: &str = "You are the architect of a long-running serialized novel. You \
plan one chapter at a time as a JSON object. Every chapter must move the story, give the reader \
a payoff, vary its rhythm, and end on a hook.";

/// Lenient wire shape; numbers and name lists are accepted as strings too.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutlineRecord {
    title: String,
    scenes: Vec<SceneRecord>,
    #[serde(alias = "emotionalArc")]
    emotional_arc: String,
    #[serde(alias = "cliffhanger", alias = "closing_hook")]
    hook: String,
    #[serde(alias = "hookTechnique")]
    hook_technique: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SceneRecord {
    #[serde(alias = "location")]
    setting: String,
    #[serde(alias = "characters")]
    participants: Value,
    goal: String,
    conflict: String,
    resolution: String,
    #[serde(alias = "words", alias = "length", alias = "targetWords")]
    target_words: Value,
    #[serde(alias = "pace", alias = "pacing")]
    speed: String,
    #[serde(alias = "humor", alias = "comic")]
    comedic: Value,
}

fn names(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        Value::String(s) => {
            s.split([',', ';']).map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect()
        },
        _ => Vec::new(),
    }
}

fn words(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n.as_f64().map_or(0, |f| f.clamp(0.0, 20_000.0) as u32),
        Value::String(s) => s
            .split(|c: char| !c.is_ascii_digit())
            .find(|part| !part.is_empty())
            .and_then(|digits| digits.parse().ok())
            .unwrap_or(0),
        _ => 0,
    }
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Number(n) => n.as_u64().is_some_and(|n| n > 0),
        _ => false,
    }
}

impl From<OutlineRecord> for Outline {
    fn from(record: OutlineRecord) -> Self {
        Self {
            title: record.title.trim().to_owned(),
            scenes: record
                .scenes
                .into_iter()
                .map(|s| Scene {
                    setting: s.setting.trim().to_owned(),
                    participants: names(&s.participants),
                    goal: s.goal.trim().to_owned(),
                    conflict: s.conflict.trim().to_owned(),
                    resolution: s.resolution.trim().to_owned(),
                    target_words: words(&s.target_words),
                    speed: SceneSpeed::coerce(&s.speed),
                    comedic: flag(&s.comedic),
                })
                .collect(),
            emotional_arc: record.emotional_arc.trim().to_owned(),
            hook: record.hook.trim().to_owned(),
            hook_technique: record.hook_technique.trim().to_lowercase(),
        }
    }
}

fn filler_scene(after: Option<&Scene>, protagonist: &str) -> Scene {
    Scene {
        setting: after.map(|s| s.setting.clone()).unwrap_or_default(),
        participants: vec![protagonist.to_owned()],
        goal: format!("{protagonist} takes stock of what just happened and decides the next move"),
        conflict: "Quiet doubt about the cost of that decision".to_owned(),
        resolution: "A small, concrete resolve".to_owned(),
        target_words: 0,
        speed: SceneSpeed::Slow,
        comedic: false,
    }
}

/// Repair a parsed outline so the writer always gets a workable plan.
///
/// Returns `None` when no scene carries a setting, goal or conflict.
#[must_use]
pub fn validate_outline(
    mut outline: Outline,
    target_words: u32,
    project: &Project,
    chapter: u32,
) -> Option<Outline> {
    outline
        .scenes
        .retain(|s| !(s.setting.is_empty() && s.goal.is_empty() && s.conflict.is_empty()));
    if outline.scenes.is_empty() {
        return None;
    }
    for scene in &mut outline.scenes {
        if scene.participants.is_empty() {
            scene.participants.push(project.protagonist.clone());
        }
    }

    while outline.scenes.len() < MIN_OUTLINE_SCENES {
        let filler = filler_scene(outline.scenes.last(), &project.protagonist);
        outline.scenes.push(filler);
    }

    let floor = u64::from(target_words) * 8 / 10;
    if u64::from(outline.estimated_words()) < floor {
        let count = u32::try_from(outline.scenes.len()).unwrap_or(u32::MAX).max(1);
        let share = target_words / count;
        let remainder = target_words - share * count;
        for scene in &mut outline.scenes {
            scene.target_words = share;
        }
        if let Some(last) = outline.scenes.last_mut() {
            last.target_words += remainder;
        }
    }

    if !outline.has_slow_scene() {
        // Never the opener or the closer: those carry the bridge and the hook.
        let middle = outline.scenes.len() / 2;
        if let Some(scene) = outline.scenes.get_mut(middle) {
            scene.speed = SceneSpeed::Slow;
        }
    }
    if !outline.has_comedic_beat() {
        if let Some(scene) = outline.scenes.iter_mut().find(|s| s.speed == SceneSpeed::Slow) {
            scene.comedic = true;
        }
    }

    if outline.hook.is_empty() && !project.is_terminal_arc(chapter) {
        let conflict = outline.scenes.last().map(|s| s.conflict.trim()).unwrap_or_default();
        outline.hook = if conflict.is_empty() {
            format!("Something {} overlooked is about to surface.", project.protagonist)
        } else {
            format!("{} is still unresolved, and it is about to get worse.", conflict.trim_end_matches('.'))
        };
        if outline.hook_technique.is_empty() {
            outline.hook_technique = "threat".to_owned();
        }
    }
    if outline.title.is_empty() {
        outline.title = format!("Chapter {chapter}");
    }
    Some(outline)
}

pub struct Architect {
    llm: Arc<dyn CompletionProvider>,
}

impl Architect {
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self { llm }
    }

    pub async fn draft(
        &self,
        project: &Project,
        context: &AssembledContext,
        target_words: u32,
        feedback: &[String],
    ) -> Result<Outline, PipelineError> {
        let chapter = context.chapter;
        let request = CompletionRequest::new(outline_prompt(project, context, target_words, feedback))
            .with_system(ARCHITECT_SYSTEM)
            .with_temperature(0.8)
            .with_max_tokens(3000)
            .structured();
        let response = self.llm.complete(&request).await?;
        if response.finish_reason.is_truncated() {
            tracing::debug!(chapter, "outline reply truncated, repairing");
        }
        let record: OutlineRecord = parse_structured(&response.text)
            .map_err(|e| PipelineError::failed(chapter, format!("outline unparsable: {e}")))?;
        let outline = validate_outline(record.into(), target_words, project, chapter)
            .ok_or_else(|| PipelineError::failed(chapter, "outline has no usable scenes"))?;
        tracing::debug!(
            chapter,
            scenes = outline.scenes.len(),
            estimated_words = outline.estimated_words(),
            "outline drafted"
        );
        Ok(outline)
    }
}

fn outline_prompt(
    project: &Project,
    context: &AssembledContext,
    target_words: u32,
    feedback: &[String],
) -> String {
    let chapter = context.chapter;
    let ending = if project.is_terminal_arc(chapter) {
        "This chapter is in the final arc. A closing hook is optional; resolution is allowed."
    } else {
        "End on a concrete hook that forces the reader into the next chapter."
    };
    let brief = context.brief().unwrap_or("Advance the most urgent thread.");
    let feedback = if feedback.is_empty() {
        String::new()
    } else {
        format!("\nFIX THESE PROBLEMS FROM EARLIER ATTEMPTS:\n- {}\n", feedback.join("\n- "))
    };
    format!(
        r#"{context}
Plan chapter {chapter} of "{title}" (about {target_words} words).
Brief: {brief}

Requirements:
- At least {min_scenes} scenes. The first scene resolves or continues the bridge.
- At least one slow, low-intensity scene and at least one light comedic beat.
- Only living characters. Only explored locations or locations the arc allows.
- A title that differs from recent titles.
- {ending}
{feedback}
Return JSON:
{{
  "title": "chapter title",
  "scenes": [
    {{"setting": "place", "participants": ["name"], "goal": "what the scene wants",
      "conflict": "what opposes it", "resolution": "how it lands",
      "target_words": 700, "speed": "fast|medium|slow", "comedic": false}}
  ],
  "emotional_arc": "from X to Y",
  "hook": "the closing hook",
  "hook_technique": "question|threat|reveal|arrival|deadline"
}}"#,
        context = context.text,
        title = project.title,
        min_scenes = MIN_OUTLINE_SCENES,
    )
}
