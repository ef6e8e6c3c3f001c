use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::critique::CritiqueReport;
use crate::outline::Outline;
use crate::text::word_count;

/// A committed chapter. Unique per (project, number).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chapter {
    pub project_id: String,
    pub number: u32,
    pub title: String,
    pub body: String,
    pub word_count: u32,
    pub outline: Option<Outline>,
    pub critique: Option<CritiqueReport>,
    pub created_at: DateTime<Utc>,
}

impl Chapter {
    /// Chapter with its word count derived from `body`.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        number: u32,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let body = body.into();
        Self {
            project_id: project_id.into(),
            number,
            title: title.into(),
            word_count: u32::try_from(word_count(&body)).unwrap_or(u32::MAX),
            body,
            outline: None,
            critique: None,
            created_at: Utc::now(),
        }
    }
}

/// Per-chapter digest carrying the bridge into the next chapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChapterSummary {
    pub project_id: String,
    pub number: u32,
    pub summary: String,
    pub protagonist_state: String,
    /// Empty only when the project is in its terminal arc.
    pub unresolved_hook: String,
    pub created_at: DateTime<Utc>,
}

/// Rolling story synopsis; exactly one live row per project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Synopsis {
    pub project_id: String,
    pub summary: String,
    pub protagonist_state: String,
    pub allies: Vec<String>,
    pub enemies: Vec<String>,
    pub open_threads: Vec<String>,
    /// Chapter the synopsis was last refreshed at.
    pub as_of_chapter: u32,
}
