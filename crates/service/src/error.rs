//! Typed error enum for the service layer.
//!
//! Unifies storage and pipeline failures so batch callers can report the
//! failed chapter without downcasting.

use novelmill_pipeline::PipelineError;
use novelmill_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// Generation of a specific chapter failed; nothing was committed for it.
    #[error("project {project_id} chapter {chapter}: {source}")]
    Chapter {
        project_id: String,
        chapter: u32,
        #[source]
        source: PipelineError,
    },

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ServiceError {
    /// Whether this error is likely transient (worth retrying).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Chapter { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProjectNotFound(_) | Self::Storage(StorageError::NotFound { .. }))
    }

    /// Chapter the failure belongs to, when one had been resolved.
    pub const fn chapter(&self) -> Option<u32> {
        match *self {
            Self::Chapter { chapter, .. } => Some(chapter),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_failure_carries_its_number() {
        let err = ServiceError::Chapter {
            project_id: "p1".to_owned(),
            chapter: 46,
            source: PipelineError::failed(46, "no approved draft after 3 attempts"),
        };
        assert_eq!(err.chapter(), Some(46));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("chapter 46"));
    }

    #[test]
    fn test_missing_project_is_not_found() {
        assert!(ServiceError::ProjectNotFound("p9".to_owned()).is_not_found());
        assert_eq!(ServiceError::InvalidInput("x".to_owned()).chapter(), None);
    }
}
