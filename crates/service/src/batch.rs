//! Cross-project batch runner.
//!
//! A fixed pool of workers draws `(project, chapters)` tasks from a shared
//! queue. Each task is claimed by exactly one worker; inside a task the
//! project advances strictly one chapter after another.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTask {
    pub project_id: String,
    pub chapters: u32,
}

impl BatchTask {
    #[must_use]
    pub fn new(project_id: impl Into<String>, chapters: u32) -> Self {
        Self { project_id: project_id.into(), chapters }
    }
}

/// A chapter that failed; the rest of its project's task was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub project_id: String,
    /// `None` when the failure happened before a chapter was resolved.
    pub chapter: Option<u32>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// `(project, chapter)` pairs committed, in completion order per project.
    pub written: Vec<(String, u32)>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct WorkerResult {
    written: Vec<(String, u32)>,
    failures: Vec<BatchFailure>,
}

/// Run `tasks` on `workers` concurrent workers.
///
/// Tasks naming the same project are merged first, so one project is never
/// advanced by two workers at once.
pub async fn run_batch(
    orchestrator: Arc<Orchestrator>,
    tasks: Vec<BatchTask>,
    workers: usize,
) -> BatchReport {
    let tasks = Arc::new(merge_tasks(tasks));
    if tasks.is_empty() {
        return BatchReport::default();
    }
    let next = Arc::new(AtomicUsize::new(0));
    let workers = workers.clamp(1, tasks.len());
    tracing::info!(tasks = tasks.len(), workers, "batch started");

    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let orchestrator = Arc::clone(&orchestrator);
        let tasks = Arc::clone(&tasks);
        let next = Arc::clone(&next);
        handles.push(tokio::spawn(async move {
            let mut result = WorkerResult::default();
            loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(task) = tasks.get(index) else {
                    break;
                };
                tracing::debug!(worker, project = %task.project_id, chapters = task.chapters, "task claimed");
                run_task(&orchestrator, task, &mut result).await;
            }
            result
        }));
    }

    let mut report = BatchReport::default();
    for handle in handles {
        match handle.await {
            Ok(result) => {
                report.written.extend(result.written);
                report.failures.extend(result.failures);
            },
            Err(e) => {
                tracing::error!(error = %e, "batch worker aborted");
                report.failures.push(BatchFailure {
                    project_id: String::new(),
                    chapter: None,
                    reason: format!("worker aborted: {e}"),
                });
            },
        }
    }
    tracing::info!(
        written = report.written.len(),
        failed = report.failures.len(),
        "batch finished"
    );
    report
}

async fn run_task(orchestrator: &Orchestrator, task: &BatchTask, result: &mut WorkerResult) {
    for _ in 0..task.chapters {
        match orchestrator.advance_one_chapter(&task.project_id).await {
            Ok(outcome) => result.written.push((outcome.project_id, outcome.chapter)),
            Err(e) => {
                tracing::warn!(
                    project = %task.project_id,
                    chapter = ?e.chapter(),
                    error = %e,
                    "chapter failed, skipping rest of task"
                );
                result.failures.push(BatchFailure {
                    project_id: task.project_id.clone(),
                    chapter: e.chapter(),
                    reason: e.to_string(),
                });
                break;
            },
        }
    }
    orchestrator.drain(&task.project_id).await;
}

fn merge_tasks(tasks: Vec<BatchTask>) -> Vec<BatchTask> {
    let mut merged: Vec<BatchTask> = Vec::with_capacity(tasks.len());
    for task in tasks {
        if task.chapters == 0 {
            continue;
        }
        match merged.iter_mut().find(|t| t.project_id == task.project_id) {
            Some(existing) => existing.chapters = existing.chapters.saturating_add(task.chapters),
            None => merged.push(task),
        }
    }
    merged
}
