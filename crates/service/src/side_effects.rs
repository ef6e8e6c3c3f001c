use std::sync::Arc;

use novelmill_memory::{CommittedChapter, MemorySuite};
use serde::Serialize;
use tokio::task::JoinSet;

/// Result of one post-commit write. Failures are logged, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerOutcome {
    pub tracker: &'static str,
    pub chapter: u32,
    pub error: Option<String>,
}

impl TrackerOutcome {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Run every tracker write plus semantic ingestion for one committed chapter.
///
/// The writes run concurrently with no ordering among them.
pub(crate) async fn run_tracker_writes(
    memory: MemorySuite,
    chapter: CommittedChapter,
    backfill_limit: usize,
) -> Vec<TrackerOutcome> {
    let chapter = Arc::new(chapter);
    let mut tasks = JoinSet::new();

    for tracker in memory.trackers() {
        let chapter = Arc::clone(&chapter);
        tasks.spawn(async move {
            let result = tracker.on_chapter_committed(&chapter).await;
            TrackerOutcome {
                tracker: tracker.name(),
                chapter: chapter.number,
                error: result.err().map(|e| e.to_string()),
            }
        });
    }

    let semantic = Arc::clone(&memory.semantic);
    let ingest_chapter = Arc::clone(&chapter);
    tasks.spawn(async move {
        let mut error = semantic.ingest(&ingest_chapter).await.err().map(|e| e.to_string());
        if error.is_none() && backfill_limit > 0 {
            error = semantic
                .backfill_embeddings(&ingest_chapter.project_id, backfill_limit)
                .await
                .err()
                .map(|e| e.to_string());
        }
        TrackerOutcome { tracker: "semantic", chapter: ingest_chapter.number, error }
    });

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => {
                if let Some(e) = &outcome.error {
                    tracing::warn!(
                        project = %chapter.project_id,
                        chapter = chapter.number,
                        tracker = outcome.tracker,
                        error = %e,
                        "tracker write failed"
                    );
                }
                outcomes.push(outcome);
            },
            Err(e) => {
                tracing::warn!(
                    project = %chapter.project_id,
                    chapter = chapter.number,
                    error = %e,
                    "tracker task aborted"
                );
            },
        }
    }
    outcomes.sort_by_key(|o| o.tracker);
    outcomes
}
