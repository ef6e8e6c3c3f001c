use std::sync::Arc;

use chrono::Utc;
use novelmill_core::{ArcPlan, CharacterState, LifeStatus, Project, arc_index};
use novelmill_embeddings::HashingEmbedder;
use novelmill_llm::ScriptedProvider;
use novelmill_memory::{MemorySuite, Roster};
use novelmill_storage::{MemoryStorage, NarrativeStore};

use crate::context::{AssembledContext, Blacklist};

pub(crate) fn project() -> Project {
    let mut project = Project::new("p1", "The Ninth Gate", "Lin");
    project.genre = "xianxia".to_owned();
    project.vision = "A disciple climbs from outer sect to sovereign.".to_owned();
    project.story_bible = "Realms: Qi Condensation, Foundation, Core.".to_owned();
    project.planned_chapters = 100;
    project
}

pub(crate) fn store() -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::new())
}

pub(crate) fn suite(store: &Arc<MemoryStorage>, llm: &Arc<ScriptedProvider>) -> MemorySuite {
    let store: Arc<dyn NarrativeStore> = store.clone();
    MemorySuite::new(store, llm.clone(), Arc::new(HashingEmbedder::default()))
}

pub(crate) fn state(name: &str, chapter: u32, status: LifeStatus) -> CharacterState {
    CharacterState {
        project_id: "p1".to_owned(),
        name: name.to_owned(),
        chapter,
        status,
        power: String::new(),
        location: String::new(),
        recorded_at: Utc::now(),
    }
}

/// `words` words of calm filler prose, ten words per sentence, five sentences per paragraph.
pub(crate) fn prose(words: usize) -> String {
    const SENTENCE: &str = "Lin walked the long road toward the gate at dusk.";
    let sentences = words / 10;
    let mut paragraphs = Vec::new();
    for chunk in (0..sentences).collect::<Vec<_>>().chunks(5) {
        paragraphs.push(vec![SENTENCE; chunk.len()].join(" "));
    }
    paragraphs.join("\n\n")
}

pub(crate) fn outline_json(scenes: usize, words_each: u32) -> String {
    let scenes: Vec<serde_json::Value> = (0..scenes)
        .map(|i| {
            serde_json::json!({
                "setting": "Azure Peak",
                "participants": ["Lin", "Mara"],
                "goal": format!("goal {i}"),
                "conflict": format!("conflict {i}"),
                "resolution": "partial",
                "target_words": words_each,
                "speed": if i == 1 { "slow" } else { "fast" },
                "comedic": i == 1
            })
        })
        .collect();
    serde_json::json!({
        "title": "Ash on the Wind",
        "scenes": scenes,
        "emotional_arc": "dread to defiance",
        "hook": "A sealed letter bears his dead father's seal.",
        "hook_technique": "reveal"
    })
    .to_string()
}

pub(crate) fn critique_json(overall: f32, verdict: &str) -> String {
    serde_json::json!({
        "scores": { "overall": overall, "dopamine": overall, "pacing": overall, "hook": overall },
        "verdict": verdict,
        "issues": [],
        "feedback": "Sharpen the duel."
    })
    .to_string()
}

/// Minimal context for step-level tests.
pub(crate) fn context(chapter: u32) -> AssembledContext {
    AssembledContext {
        chapter,
        text: "## BRIDGE FROM THE PREVIOUS CHAPTER (MANDATORY)\nThe envoy waits.\n\n".to_owned(),
        bridge: None,
        roster: Roster::default(),
        arc_plan: ArcPlan::new("p1", arc_index(chapter)),
        cast: vec!["Lin".to_owned()],
        unexplored: Vec::new(),
        blacklist: Blacklist::default(),
        trimmed: Vec::new(),
    }
}
