use std::sync::Arc;

use novelmill_core::{HintStatus, Project};
use novelmill_storage::NarrativeStore;
use serde::Serialize;

use crate::ServiceError;
use crate::cursor::missing_chapters;

/// Progress snapshot of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectStatus {
    pub project_id: String,
    pub title: String,
    pub cursor: u32,
    pub planned_chapters: u32,
    pub committed: usize,
    pub max_committed: u32,
    pub gaps: Vec<u32>,
    pub open_threads: usize,
    /// Planned or planted hints not yet paid off.
    pub pending_hints: usize,
}

impl ProjectStatus {
    /// Cursor disagrees with what is committed; the next advance repairs it.
    #[must_use]
    pub fn needs_repair(&self) -> bool {
        !self.gaps.is_empty() || self.cursor > self.max_committed
    }
}

pub struct ProjectService {
    store: Arc<dyn NarrativeStore>,
}

impl ProjectService {
    #[must_use]
    pub fn new(store: Arc<dyn NarrativeStore>) -> Self {
        Self { store }
    }

    /// Register a new project. Existing ids are left untouched unless `overwrite`.
    pub async fn create_project(
        &self,
        project: &Project,
        overwrite: bool,
    ) -> Result<(), ServiceError> {
        if project.id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("project id is empty".to_owned()));
        }
        if project.protagonist.trim().is_empty() {
            return Err(ServiceError::InvalidInput("protagonist is empty".to_owned()));
        }
        if !overwrite && self.store.get_project(&project.id).await?.is_some() {
            return Err(ServiceError::InvalidInput(format!(
                "project {} already exists",
                project.id
            )));
        }
        self.store.save_project(project).await?;
        tracing::info!(project = %project.id, title = %project.title, "project saved");
        Ok(())
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Project, ServiceError> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| ServiceError::ProjectNotFound(project_id.to_owned()))
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
        Ok(self.store.list_projects().await?)
    }

    pub async fn status(&self, project_id: &str) -> Result<ProjectStatus, ServiceError> {
        let project = self.get_project(project_id).await?;
        let numbers = self.store.chapter_numbers(project_id).await?;
        let threads = self.store.list_threads(project_id).await?;
        let hints = self.store.list_hints(project_id).await?;
        Ok(ProjectStatus {
            project_id: project.id,
            title: project.title,
            cursor: project.cursor,
            planned_chapters: project.planned_chapters,
            committed: numbers.len(),
            max_committed: numbers.iter().copied().max().unwrap_or(0),
            gaps: missing_chapters(&numbers),
            open_threads: threads.iter().filter(|t| t.status.is_active()).count(),
            pending_hints: hints
                .iter()
                .filter(|h| matches!(h.status, HintStatus::Planned | HintStatus::Planted))
                .count(),
        })
    }

    pub async fn status_all(&self) -> Result<Vec<ProjectStatus>, ServiceError> {
        let projects = self.store.list_projects().await?;
        let mut report = Vec::with_capacity(projects.len());
        for project in projects {
            report.push(self.status(&project.id).await?);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use novelmill_core::{PlotThread, ThreadPriority, ThreadStatus};
    use novelmill_storage::ThreadStore;

    use super::*;
    use crate::test_support::{project, seed, store};

    fn thread(id: &str, status: ThreadStatus) -> PlotThread {
        PlotThread {
            id: id.to_owned(),
            project_id: "p1".to_owned(),
            title: format!("thread {id}"),
            description: String::new(),
            priority: ThreadPriority::Sub,
            status,
            related_characters: Vec::new(),
            introduced_chapter: 3,
            last_touched_chapter: 40,
            payoff_deadline: None,
        }
    }

    #[tokio::test]
    async fn test_status_reports_gaps_and_open_threads() {
        let store = store();
        let mut p = project("p1");
        p.cursor = 50;
        let committed: Vec<u32> = (1..=45).chain(47..=50).collect();
        seed(&store, &p, &committed).await;
        store.upsert_thread(&thread("envoy", ThreadStatus::Developing)).await.unwrap();
        store.upsert_thread(&thread("pill", ThreadStatus::Resolved)).await.unwrap();

        let status = ProjectService::new(store).status("p1").await.unwrap();
        assert_eq!(status.committed, 49);
        assert_eq!(status.max_committed, 50);
        assert_eq!(status.gaps, vec![46]);
        assert_eq!(status.open_threads, 1);
        assert_eq!(status.pending_hints, 0);
        assert!(status.needs_repair());
    }

    #[tokio::test]
    async fn test_create_refuses_to_clobber_existing_project() {
        let store = store();
        let service = ProjectService::new(Arc::clone(&store) as Arc<dyn NarrativeStore>);
        let mut p = project("p1");
        service.create_project(&p, false).await.unwrap();

        p.title = "Another Title".to_owned();
        let err = service.create_project(&p, false).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
        service.create_project(&p, true).await.unwrap();
        assert_eq!(service.get_project("p1").await.unwrap().title, "Another Title");
    }

    #[tokio::test]
    async fn test_unknown_project_status_is_not_found() {
        let err = ProjectService::new(store()).status("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
