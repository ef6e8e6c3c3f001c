use std::sync::Arc;

use novelmill_core::{Chapter, Project};
use novelmill_embeddings::HashingEmbedder;
use novelmill_llm::ScriptedProvider;
use novelmill_storage::{ChapterStore, MemoryStorage, ProjectStore};

use crate::config::OrchestratorConfig;
use crate::orchestrator::Orchestrator;

pub(crate) const ENDING: &str = "\n\nThen footsteps stopped outside the door.";

pub(crate) fn project(id: &str) -> Project {
    let mut project = Project::new(id, "The Ninth Gate", "Lin");
    project.genre = "xianxia".to_owned();
    project.vision = "A disciple climbs from outer sect to sovereign.".to_owned();
    project.planned_chapters = 100;
    project
}

pub(crate) fn store() -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::new())
}

pub(crate) fn orchestrator(
    store: &Arc<MemoryStorage>,
    llm: &Arc<ScriptedProvider>,
) -> Orchestrator {
    Orchestrator::new(
        store.clone(),
        llm.clone(),
        Arc::new(HashingEmbedder::default()),
        OrchestratorConfig::default(),
    )
}

/// `words` words of calm prose, ten words per sentence.
pub(crate) fn prose(words: usize) -> String {
    const SENTENCE: &str = "Lin walked the long road toward the gate at dusk.";
    let sentences = words / 10;
    let mut paragraphs = Vec::new();
    for chunk in (0..sentences).collect::<Vec<_>>().chunks(5) {
        paragraphs.push(vec![SENTENCE; chunk.len()].join(" "));
    }
    paragraphs.join("\n\n")
}

pub(crate) fn outline_json() -> String {
    let scenes: Vec<serde_json::Value> = (0..3)
        .map(|i| {
            serde_json::json!({
                "setting": "Azure Peak",
                "participants": ["Lin", "Mara"],
                "goal": format!("goal {i}"),
                "conflict": format!("conflict {i}"),
                "target_words": 900,
                "speed": if i == 1 { "slow" } else { "fast" },
                "comedic": i == 1
            })
        })
        .collect();
    serde_json::json!({
        "title": "Ash on the Wind",
        "scenes": scenes,
        "hook": "A sealed letter bears his dead father's seal.",
        "hook_technique": "reveal"
    })
    .to_string()
}

pub(crate) fn critique_json(overall: f32, verdict: &str) -> String {
    serde_json::json!({
        "scores": { "overall": overall, "pacing": overall, "hook": overall },
        "verdict": verdict,
        "issues": [],
        "feedback": "Tighten the middle."
    })
    .to_string()
}

/// Provider that approves every chapter on the first attempt.
pub(crate) fn approving_llm() -> ScriptedProvider {
    ScriptedProvider::new()
        .on("Critique chapter", critique_json(8.5, "approve"))
        .on("Plan chapter", outline_json())
        .on("Write chapter", format!("{}{ENDING}", prose(2600)))
}

pub(crate) async fn seed(store: &MemoryStorage, project: &Project, chapters: &[u32]) {
    store.save_project(project).await.unwrap();
    for &n in chapters {
        let chapter = Chapter::new(&project.id, n, format!("Chapter {n}"), prose(200));
        store.upsert_chapter(&chapter).await.unwrap();
    }
}
