//! PostgreSQL schema migrations for novelmill storage.

use anyhow::Result;
use sqlx::PgPool;

/// Tables whose payload is a single JSONB document keyed by (project, key).
const DOC_TABLES: &[(&str, &str)] = &[
    ("arc_plans", "arc_index INTEGER NOT NULL"),
    ("plot_threads", "thread_id TEXT NOT NULL"),
    ("foreshadowing_hints", "hint_id TEXT NOT NULL"),
    ("character_arcs", "name TEXT NOT NULL"),
    ("locations", "name TEXT NOT NULL"),
];

/// Run all PostgreSQL migrations.
///
/// `embedding_dim` fixes the width of the `memory_chunks.embedding` column on
/// first creation; later runs leave an existing column untouched.
pub async fn run_pg_migrations(pool: &PgPool, embedding_dim: usize) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            genre TEXT NOT NULL DEFAULT '',
            vision TEXT NOT NULL DEFAULT '',
            story_bible TEXT NOT NULL DEFAULT '',
            protagonist TEXT NOT NULL,
            planned_chapters INTEGER NOT NULL,
            target_words INTEGER NOT NULL,
            cursor INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chapters (
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            number INTEGER NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            word_count INTEGER NOT NULL,
            outline JSONB,
            critique JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (project_id, number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chapter_summaries (
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            number INTEGER NOT NULL,
            summary TEXT NOT NULL,
            protagonist_state TEXT NOT NULL DEFAULT '',
            unresolved_hook TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (project_id, number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS synopses (
            project_id TEXT PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
            summary TEXT NOT NULL,
            protagonist_state TEXT NOT NULL DEFAULT '',
            allies JSONB NOT NULL DEFAULT '[]',
            enemies JSONB NOT NULL DEFAULT '[]',
            open_threads JSONB NOT NULL DEFAULT '[]',
            as_of_chapter INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for (table, key) in DOC_TABLES {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                {key},
                doc JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (project_id, {col})
            )",
            col = key.split_whitespace().next().unwrap_or("id"),
        ))
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS beat_usages (
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            beat TEXT NOT NULL,
            chapter INTEGER NOT NULL,
            cooldown_until INTEGER NOT NULL,
            PRIMARY KEY (project_id, beat, chapter)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS character_states (
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            chapter INTEGER NOT NULL,
            status TEXT NOT NULL,
            power TEXT NOT NULL DEFAULT '',
            location TEXT NOT NULL DEFAULT '',
            recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (project_id, name, chapter)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS power_states (
            project_id TEXT PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
            doc JSONB NOT NULL,
            updated_chapter INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS voice_fingerprints (
            project_id TEXT PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
            doc JSONB NOT NULL,
            computed_chapter INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // pgvector extension + chunk table
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector").execute(pool).await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS memory_chunks (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            chapter INTEGER NOT NULL,
            ordinal INTEGER NOT NULL,
            kind TEXT NOT NULL,
            text TEXT NOT NULL,
            embedding vector({embedding_dim}),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_project_chapter ON memory_chunks (project_id, chapter)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_embedding ON memory_chunks USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100)",
    )
    .execute(pool)
    .await
    .ok(); // May fail if < 100 rows; that's fine

    tracing::info!("PostgreSQL migrations applied");
    Ok(())
}
