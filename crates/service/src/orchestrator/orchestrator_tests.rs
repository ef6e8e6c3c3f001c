use std::sync::Arc;

use novelmill_llm::ScriptedProvider;
use novelmill_storage::{ChapterStore, ProjectStore, SummaryStore};

use super::*;
use crate::test_support::{
    ENDING, approving_llm, critique_json, orchestrator, outline_json, project, prose, seed, store,
};

#[tokio::test]
async fn test_advance_commits_chapter_and_moves_cursor() {
    let store = store();
    let llm = Arc::new(approving_llm());
    seed(&store, &project("p1"), &[]).await;
    let orchestrator = orchestrator(&store, &llm);

    let outcome = orchestrator.advance_one_chapter("p1").await.unwrap();
    assert_eq!(outcome.chapter, 1);
    assert_eq!(outcome.cursor, 1);
    assert_eq!(outcome.attempts, 1);
    assert!(!outcome.filled_gap);

    let stored = store.get_chapter("p1", 1).await.unwrap().unwrap();
    assert_eq!(stored.title, "Ash on the Wind");
    assert!(stored.critique.is_some());
    assert_eq!(store.get_project("p1").await.unwrap().unwrap().cursor, 1);
}

#[tokio::test]
async fn test_tracker_failures_never_undo_the_commit() {
    let store = store();
    // Character extraction has no scripted reply and fails.
    let llm = Arc::new(approving_llm());
    seed(&store, &project("p1"), &[]).await;
    let orchestrator = orchestrator(&store, &llm);

    orchestrator.advance_one_chapter("p1").await.unwrap();
    let outcomes = orchestrator.drain("p1").await;

    assert_eq!(outcomes.len(), 7);
    let character = outcomes.iter().find(|o| o.tracker == "character").unwrap();
    assert!(character.error.is_some());
    assert!(outcomes.iter().find(|o| o.tracker == "semantic").unwrap().is_ok());
    assert!(store.get_chapter("p1", 1).await.unwrap().is_some());
    assert!(orchestrator.drain("p1").await.is_empty());
}

#[tokio::test]
async fn test_next_chapter_sees_previous_tracker_writes() {
    let store = store();
    let summary = serde_json::json!({
        "summary": "Lin reached the gate.",
        "protagonist_state": "wounded, at the outer gate",
        "unresolved_hook": "The envoy never arrived.",
        "threads_touched": [],
        "new_threads": []
    });
    let llm = Arc::new(approving_llm().on("Summarize chapter", summary.to_string()));
    seed(&store, &project("p1"), &[]).await;
    let orchestrator = orchestrator(&store, &llm);

    orchestrator.advance_one_chapter("p1").await.unwrap();
    let second = orchestrator.advance_one_chapter("p1").await.unwrap();
    assert_eq!(second.chapter, 2);

    let bridge = store.get_chapter_summary("p1", 1).await.unwrap().unwrap();
    assert_eq!(bridge.unresolved_hook, "The envoy never arrived.");
    let writer_prompt = llm
        .calls()
        .into_iter()
        .find(|c| c.prompt.contains("Write chapter 2"))
        .unwrap()
        .prompt;
    assert!(writer_prompt.contains("Chapter 1 ended on: The envoy never arrived."));
    orchestrator.drain_all().await;
}

#[tokio::test]
async fn test_gap_is_filled_before_appending() {
    let store = store();
    let llm = Arc::new(approving_llm());
    let mut p = project("p1");
    p.cursor = 50;
    let committed: Vec<u32> = (1..=45).chain(47..=50).collect();
    seed(&store, &p, &committed).await;
    let orchestrator = orchestrator(&store, &llm);

    let filled = orchestrator.advance_one_chapter("p1").await.unwrap();
    assert_eq!(filled.chapter, 46);
    assert!(filled.filled_gap);
    assert_eq!(filled.cursor, 50);
    assert_eq!(store.get_project("p1").await.unwrap().unwrap().cursor, 50);

    let next = orchestrator.advance_one_chapter("p1").await.unwrap();
    assert_eq!(next.chapter, 51);
    assert_eq!(next.cursor, 51);
    orchestrator.drain_all().await;
}

#[tokio::test]
async fn test_cursor_ahead_of_committed_is_rolled_back() {
    let store = store();
    let llm = Arc::new(approving_llm());
    let mut p = project("p1");
    p.cursor = 9;
    seed(&store, &p, &[1, 2, 3]).await;
    let orchestrator = orchestrator(&store, &llm);

    let outcome = orchestrator.advance_one_chapter("p1").await.unwrap();
    assert_eq!(outcome.chapter, 4);
    assert_eq!(outcome.cursor, 4);
    orchestrator.drain_all().await;
}

#[tokio::test]
async fn test_failed_chapter_is_reported_and_cursor_stays() {
    let store = store();
    let llm = Arc::new(
        ScriptedProvider::new()
            .on("Critique chapter", critique_json(5.0, "revise"))
            .on("Plan chapter", outline_json())
            .on("Write chapter", format!("{}{ENDING}", prose(2600))),
    );
    seed(&store, &project("p1"), &[1, 2]).await;
    store.set_cursor("p1", 2).await.unwrap();
    let orchestrator = orchestrator(&store, &llm);

    let err = orchestrator.advance_one_chapter("p1").await.unwrap_err();
    assert_eq!(err.chapter(), Some(3));
    assert!(err.to_string().contains("after 3 attempts"));
    assert!(store.get_chapter("p1", 3).await.unwrap().is_none());
    assert_eq!(store.get_project("p1").await.unwrap().unwrap().cursor, 2);
}

#[tokio::test]
async fn test_unknown_project_is_not_found() {
    let store = store();
    let llm = Arc::new(approving_llm());
    let err = orchestrator(&store, &llm).advance_one_chapter("ghost").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(llm.calls().is_empty());
}
