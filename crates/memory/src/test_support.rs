use std::sync::Arc;

use novelmill_core::{Outline, Project, Scene, SceneSpeed};
use novelmill_llm::ScriptedProvider;
use novelmill_storage::{MemoryStorage, NarrativeStore};

use crate::tracker::CommittedChapter;

pub(crate) fn project() -> Project {
    let mut project = Project::new("p1", "The Ninth Gate", "Lin");
    project.genre = "xianxia".to_owned();
    project.vision = "A disciple climbs from outer sect to sovereign.".to_owned();
    project.planned_chapters = 100;
    project
}

pub(crate) fn store() -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::new())
}

pub(crate) fn dyn_store(store: &Arc<MemoryStorage>) -> Arc<dyn NarrativeStore> {
    store.clone()
}

pub(crate) fn llm(provider: ScriptedProvider) -> Arc<ScriptedProvider> {
    Arc::new(provider)
}

pub(crate) fn scene(setting: &str, participants: &[&str], goal: &str, conflict: &str) -> Scene {
    Scene {
        setting: setting.to_owned(),
        participants: participants.iter().map(|p| (*p).to_owned()).collect(),
        goal: goal.to_owned(),
        conflict: conflict.to_owned(),
        resolution: String::new(),
        target_words: 900,
        speed: SceneSpeed::Medium,
        comedic: false,
    }
}

pub(crate) fn outline(scenes: Vec<Scene>, hook: &str) -> Outline {
    Outline {
        title: "Chapter".to_owned(),
        scenes,
        emotional_arc: "dread to resolve".to_owned(),
        hook: hook.to_owned(),
        hook_technique: "question".to_owned(),
    }
}

pub(crate) fn committed(number: u32, body: &str, outline: Option<Outline>) -> CommittedChapter {
    let mut cast = vec!["Lin".to_owned()];
    if let Some(o) = &outline {
        for name in o.cast() {
            if !cast.iter().any(|c| c.eq_ignore_ascii_case(&name)) {
                cast.push(name);
            }
        }
    }
    CommittedChapter {
        project_id: "p1".to_owned(),
        protagonist: "Lin".to_owned(),
        number,
        title: format!("Chapter {number}"),
        body: body.to_owned(),
        outline,
        cast,
        terminal_arc: false,
    }
}
