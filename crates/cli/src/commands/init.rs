use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use novelmill_core::Project;
use novelmill_service::ProjectService;

pub(crate) struct InitArgs {
    pub id: String,
    pub title: String,
    pub protagonist: String,
    pub genre: String,
    pub vision: Option<String>,
    pub vision_file: Option<PathBuf>,
    pub story_bible_file: Option<PathBuf>,
    pub chapters: u32,
    pub target_words: u32,
    pub force: bool,
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub(crate) async fn run(args: InitArgs) -> Result<()> {
    let mut project = Project::new(args.id, args.title, args.protagonist);
    project.genre = args.genre;
    project.vision = match (&args.vision, &args.vision_file) {
        (Some(vision), _) => vision.clone(),
        (None, Some(path)) => read_text(path)?,
        (None, None) => String::new(),
    };
    if let Some(path) = &args.story_bible_file {
        project.story_bible = read_text(path)?;
    }
    project.planned_chapters = args.chapters;
    project.target_words = args.target_words;

    let embedder = crate::open_embedder()?;
    let store = crate::open_store(embedder.dimension()).await?;
    ProjectService::new(store).create_project(&project, args.force).await?;
    println!("{}", serde_json::to_string_pretty(&project)?);
    Ok(())
}
