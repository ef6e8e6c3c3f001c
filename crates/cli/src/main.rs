use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use novelmill_core::env_string;
use novelmill_embeddings::EmbeddingProvider;
use novelmill_storage::{MemoryStorage, NarrativeStore, PgStorage};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "novelmill")]
#[command(about = "Serialized long-form fiction generator with durable narrative memory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the PostgreSQL schema (requires DATABASE_URL)
    Migrate,
    /// Register a new project
    Init {
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        protagonist: String,
        #[arg(long, default_value = "")]
        genre: String,
        /// Global outline of the whole story
        #[arg(long)]
        vision: Option<String>,
        /// Read the global outline from a file instead
        #[arg(long, conflicts_with = "vision")]
        vision_file: Option<PathBuf>,
        /// World rules, power system and setting notes
        #[arg(long)]
        story_bible_file: Option<PathBuf>,
        #[arg(long, default_value_t = 400)]
        chapters: u32,
        #[arg(long, default_value_t = 2800)]
        target_words: u32,
        /// Replace an existing project with the same id
        #[arg(long)]
        force: bool,
    },
    /// Write the next chapter(s) of one project
    Advance {
        project: String,
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
    /// Advance several projects with a bounded worker pool
    Batch {
        /// Tasks as `project` or `project:chapters`
        #[arg(required = true)]
        tasks: Vec<String>,
        /// Chapters per task when a task does not name a count
        #[arg(short = 'n', long, default_value_t = 1)]
        chapters: u32,
        /// Worker pool size (defaults to NOVELMILL_BATCH_WORKERS)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Show cursor, gaps and open threads per project
    Status {
        project: Option<String>,
    },
}

pub(crate) fn get_database_url() -> Option<String> {
    env_string("DATABASE_URL")
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise an in-process store that
/// is discarded on exit.
pub(crate) async fn open_store(embedding_dim: usize) -> Result<Arc<dyn NarrativeStore>> {
    match get_database_url() {
        Some(url) => {
            let storage = PgStorage::new(&url, embedding_dim)
                .await
                .context("failed to connect to DATABASE_URL")?;
            Ok(Arc::new(storage))
        },
        None => {
            tracing::warn!("DATABASE_URL not set, using in-process store; nothing will be persisted");
            Ok(Arc::new(MemoryStorage::new()))
        },
    }
}

pub(crate) fn open_embedder() -> Result<Arc<dyn EmbeddingProvider>> {
    novelmill_embeddings::provider_from_env().context("failed to initialize embeddings")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Init {
            id,
            title,
            protagonist,
            genre,
            vision,
            vision_file,
            story_bible_file,
            chapters,
            target_words,
            force,
        } => {
            let args = commands::init::InitArgs {
                id,
                title,
                protagonist,
                genre,
                vision,
                vision_file,
                story_bible_file,
                chapters,
                target_words,
                force,
            };
            commands::init::run(args).await
        },
        Commands::Advance { project, count } => commands::advance::run(&project, count).await,
        Commands::Batch { tasks, chapters, workers } => {
            commands::advance::run_batch_command(&tasks, chapters, workers).await
        },
        Commands::Status { project } => commands::status::run(project.as_deref()).await,
    }
}
