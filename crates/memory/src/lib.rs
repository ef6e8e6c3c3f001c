//! Narrative memory for novelmill
//!
//! Six trackers, each owning one slice of story state with a post-commit write
//! path and a prompt read path, plus the long-range semantic store.

mod character;
mod error;
mod foreshadow;
mod plot;
mod power;
mod semantic;
mod structured;
mod suite;
mod tracker;
mod voice;
mod world;

#[cfg(test)]
mod test_support;

pub use character::{CharacterArcTracker, Roster};
pub use error::TrackerError;
pub use foreshadow::{ForeshadowPlanner, advance_hint};
pub use plot::{BeatPlan, PlotLedger, detect_beats, plan_beats, rank_threads, score_thread};
pub use power::{PowerTracker, gain_allowed, has_breakthrough_signal, unpaid_gain};
pub use semantic::{SemanticStore, chunk_chapter};
pub use suite::MemorySuite;
pub use tracker::{CommittedChapter, FragmentQuery, MemoryTracker};
pub use voice::{VoiceTracker, detect_drift, measure, signature_phrases};
pub use world::WorldTracker;
