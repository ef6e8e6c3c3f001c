use async_trait::async_trait;
use novelmill_core::Project;

use crate::error::StorageError;

/// Project records and the persisted chapter cursor.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert or replace a project.
    async fn save_project(&self, project: &Project) -> Result<(), StorageError>;

    /// Get project by ID.
    async fn get_project(&self, id: &str) -> Result<Option<Project>, StorageError>;

    /// All projects, oldest first.
    async fn list_projects(&self) -> Result<Vec<Project>, StorageError>;

    /// Overwrite the persisted chapter cursor.
    async fn set_cursor(&self, project_id: &str, cursor: u32) -> Result<(), StorageError>;
}
