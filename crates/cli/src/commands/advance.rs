use std::sync::Arc;

use anyhow::{Context, Result};
use novelmill_llm::{CompletionProvider, LlmClient, LlmConfig};
use novelmill_service::{BatchTask, Orchestrator, OrchestratorConfig, run_batch};

async fn build_orchestrator() -> Result<Orchestrator> {
    let llm = LlmClient::new(LlmConfig::from_env()?)?;
    tracing::info!(model = %llm.model(), "completion client ready");
    let embedder = crate::open_embedder()?;
    let store = crate::open_store(embedder.dimension()).await?;
    Ok(Orchestrator::new(store, Arc::new(llm), embedder, OrchestratorConfig::from_env()))
}

pub(crate) async fn run(project: &str, count: u32) -> Result<()> {
    let orchestrator = build_orchestrator().await?;
    let mut result = Ok(());
    for _ in 0..count.max(1) {
        match orchestrator.advance_one_chapter(project).await {
            Ok(outcome) => println!("{}", serde_json::to_string(&outcome)?),
            Err(e) => {
                result = Err(e).with_context(|| format!("failed to advance {project}"));
                break;
            },
        }
    }
    let failed_writes = orchestrator.drain_all().await.iter().filter(|o| !o.is_ok()).count();
    if failed_writes > 0 {
        tracing::warn!(failed_writes, "some tracker writes failed, see log above");
    }
    result
}

pub(crate) async fn run_batch_command(
    specs: &[String],
    chapters: u32,
    workers: Option<usize>,
) -> Result<()> {
    let tasks = specs
        .iter()
        .map(|spec| parse_task(spec, chapters))
        .collect::<Result<Vec<_>>>()?;
    let orchestrator = Arc::new(build_orchestrator().await?);
    let workers = workers.unwrap_or(orchestrator.config().batch_workers);
    let report = run_batch(Arc::clone(&orchestrator), tasks, workers).await;
    orchestrator.drain_all().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.is_clean() {
        Ok(())
    } else {
        anyhow::bail!("{} project(s) stopped on a failed chapter", report.failures.len())
    }
}

/// `project` or `project:chapters`.
fn parse_task(spec: &str, default_chapters: u32) -> Result<BatchTask> {
    let (project, chapters) = match spec.rsplit_once(':') {
        Some((project, count)) => {
            let count = count
                .trim()
                .parse::<u32>()
                .with_context(|| format!("invalid chapter count in task {spec:?}"))?;
            (project.trim(), count)
        },
        None => (spec.trim(), default_chapters),
    };
    if project.is_empty() {
        anyhow::bail!("task {spec:?} names no project");
    }
    Ok(BatchTask::new(project, chapters))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_specs_parse_with_and_without_counts() {
        assert_eq!(parse_task("ninth-gate:5", 1).unwrap(), BatchTask::new("ninth-gate", 5));
        assert_eq!(parse_task("ninth-gate", 2).unwrap(), BatchTask::new("ninth-gate", 2));
        assert!(parse_task("ninth-gate:many", 1).is_err());
        assert!(parse_task(":3", 1).is_err());
    }
}
