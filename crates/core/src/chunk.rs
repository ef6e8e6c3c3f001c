use serde::{Deserialize, Serialize};

/// Kind of text a memory chunk holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Narrative,
    Dialogue,
    Summary,
}

impl ChunkKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Narrative => "narrative",
            Self::Dialogue => "dialogue",
            Self::Summary => "summary",
        }
    }

    #[must_use]
    pub fn from_db(raw: &str) -> Self {
        match raw {
            "dialogue" => Self::Dialogue,
            "summary" => Self::Summary,
            _ => Self::Narrative,
        }
    }
}

/// Chunk of committed prose; queryable once its embedding is filled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryChunk {
    pub id: String,
    pub project_id: String,
    pub chapter: u32,
    pub ordinal: u32,
    pub kind: ChunkKind,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

/// Nearest-neighbor hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMatch {
    pub chunk_id: String,
    pub chapter: u32,
    pub kind: ChunkKind,
    pub text: String,
    pub similarity: f32,
}
