//! Integration tests for PgStorage.
//! Run with: DATABASE_URL=... cargo test -p novelmill-storage -- --ignored pg_

#![allow(clippy::unwrap_used, reason = "integration test code")]

use novelmill_core::{
    ArcPlan, BeatType, BeatUsage, Chapter, ChapterSummary, ChunkKind, MemoryChunk, PlotThread,
    Project, ThreadPriority, ThreadStatus,
};
use novelmill_storage::PgStorage;
use novelmill_storage::traits::{
    ArcStore, BeatStore, ChapterStore, ChunkStore, ProjectStore, SummaryStore, ThreadStore,
};
use uuid::Uuid;

const TEST_DIM: usize = 4;

async fn create_pg_storage() -> PgStorage {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for PgStorage integration tests");
    PgStorage::new(&url, TEST_DIM).await.expect("Failed to connect to PostgreSQL")
}

async fn seeded_project(storage: &PgStorage) -> Project {
    let project = Project::new(format!("test-{}", Uuid::new_v4()), "Integration", "Lin Feng");
    storage.save_project(&project).await.unwrap();
    project
}

// ── Project & chapter tests ──────────────────────────────────────

#[tokio::test]
#[ignore]
async fn test_pg_project_cursor_roundtrip() {
    let storage = create_pg_storage().await;
    let project = seeded_project(&storage).await;

    storage.set_cursor(&project.id, 12).await.unwrap();
    let fetched = storage.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(fetched.cursor, 12);
    assert_eq!(fetched.protagonist, "Lin Feng");
}

#[tokio::test]
#[ignore]
async fn test_pg_chapter_upsert_and_recent_order() {
    let storage = create_pg_storage().await;
    let project = seeded_project(&storage).await;

    for n in [3, 1, 2, 4] {
        storage
            .upsert_chapter(&Chapter::new(&project.id, n, format!("C{n}"), "some body text"))
            .await
            .unwrap();
    }
    storage.upsert_chapter(&Chapter::new(&project.id, 2, "C2 revised", "short")).await.unwrap();

    let recent = storage.recent_chapters(&project.id, 4, 2).await.unwrap();
    let numbers: Vec<u32> = recent.iter().map(|c| c.number).collect();
    assert_eq!(numbers, vec![2, 3]);
    assert_eq!(recent[0].title, "C2 revised");
    assert_eq!(storage.count_chapters(&project.id).await.unwrap(), 4);
}

#[tokio::test]
#[ignore]
async fn test_pg_summary_and_arc_plan_roundtrip() {
    let storage = create_pg_storage().await;
    let project = seeded_project(&storage).await;

    let summary = ChapterSummary {
        project_id: project.id.clone(),
        number: 1,
        summary: "The sect gates close.".to_owned(),
        protagonist_state: "wounded".to_owned(),
        unresolved_hook: "Who sealed the gate?".to_owned(),
        created_at: chrono::Utc::now(),
    };
    storage.upsert_chapter_summary(&summary).await.unwrap();
    let fetched = storage.get_chapter_summary(&project.id, 1).await.unwrap().unwrap();
    assert_eq!(fetched.unresolved_hook, "Who sealed the gate?");

    let mut plan = ArcPlan::new(&project.id, 0);
    plan.theme = "exile".to_owned();
    storage.save_arc_plan(&plan).await.unwrap();
    assert_eq!(storage.get_arc_plan(&project.id, 0).await.unwrap().unwrap().theme, "exile");
}

// ── Plot ledger tests ────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn test_pg_threads_and_beats() {
    let storage = create_pg_storage().await;
    let project = seeded_project(&storage).await;

    let thread = PlotThread {
        id: "t1".to_owned(),
        project_id: project.id.clone(),
        title: "The sealed gate".to_owned(),
        description: String::new(),
        priority: ThreadPriority::Main,
        status: ThreadStatus::Open,
        related_characters: vec!["Lin Feng".to_owned()],
        introduced_chapter: 1,
        last_touched_chapter: 1,
        payoff_deadline: Some(30),
    };
    storage.upsert_thread(&thread).await.unwrap();
    assert_eq!(storage.list_threads(&project.id).await.unwrap(), vec![thread]);

    storage.record_beat(&BeatUsage::new(&project.id, BeatType::Duel, 5)).await.unwrap();
    let beats = storage.list_beats(&project.id, 1).await.unwrap();
    assert_eq!(beats.len(), 1);
    assert_eq!(beats[0].beat, BeatType::Duel);
}

// ── Vector search tests ──────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn test_pg_chunk_search_respects_max_chapter() {
    let storage = create_pg_storage().await;
    let project = seeded_project(&storage).await;

    let make = |id: &str, chapter: u32, embedding: Vec<f32>| MemoryChunk {
        id: format!("{}-{id}", project.id),
        project_id: project.id.clone(),
        chapter,
        ordinal: 0,
        kind: ChunkKind::Narrative,
        text: id.to_owned(),
        embedding: Some(embedding),
    };
    storage
        .replace_chapter_chunks(&project.id, 1, &[make("old", 1, vec![1.0, 0.0, 0.0, 0.0])])
        .await
        .unwrap();
    storage
        .replace_chapter_chunks(&project.id, 10, &[make("new", 10, vec![1.0, 0.0, 0.0, 0.0])])
        .await
        .unwrap();

    let hits = storage
        .search_chunks(&project.id, &[1.0, 0.0, 0.0, 0.0], 0.5, 5, 5)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "old");
    assert!(hits[0].similarity > 0.99);
}
