//! Storage backend trait abstraction
//!
//! One async trait per concern, combined into [`NarrativeStore`]. Every write is an
//! idempotent upsert keyed by the entity's unique key; no cross-table transactions
//! are assumed.

pub mod chapter;
pub mod character;
pub mod embedding;
pub mod misc;
pub mod plot;
pub mod project;

pub use chapter::{ChapterStore, SummaryStore};
pub use character::CharacterStore;
pub use embedding::ChunkStore;
pub use misc::{PowerStore, VoiceStore, WorldStore};
pub use plot::{ArcStore, BeatStore, ForeshadowStore, ThreadStore};
pub use project::ProjectStore;

/// Every storage concern the narrative engine needs.
pub trait NarrativeStore:
    ProjectStore
    + ChapterStore
    + SummaryStore
    + ArcStore
    + ThreadStore
    + BeatStore
    + ForeshadowStore
    + CharacterStore
    + PowerStore
    + VoiceStore
    + WorldStore
    + ChunkStore
{
}

impl<T> NarrativeStore for T where
    T: ProjectStore
        + ChapterStore
        + SummaryStore
        + ArcStore
        + ThreadStore
        + BeatStore
        + ForeshadowStore
        + CharacterStore
        + PowerStore
        + VoiceStore
        + WorldStore
        + ChunkStore
{
}
