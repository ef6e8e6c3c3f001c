use std::sync::Arc;

use novelmill_embeddings::EmbeddingProvider;
use novelmill_llm::CompletionProvider;
use novelmill_storage::NarrativeStore;

use crate::character::CharacterArcTracker;
use crate::foreshadow::ForeshadowPlanner;
use crate::plot::PlotLedger;
use crate::power::PowerTracker;
use crate::semantic::SemanticStore;
use crate::tracker::MemoryTracker;
use crate::voice::VoiceTracker;
use crate::world::WorldTracker;

/// The fixed set of trackers plus the semantic store, sharing one store and model.
///
/// Typed handles are kept for the read paths the context assembler and critic
/// need beyond [`MemoryTracker::context_fragment`].
#[derive(Clone)]
pub struct MemorySuite {
    pub plot: Arc<PlotLedger>,
    pub foreshadow: Arc<ForeshadowPlanner>,
    pub characters: Arc<CharacterArcTracker>,
    pub power: Arc<PowerTracker>,
    pub voice: Arc<VoiceTracker>,
    pub world: Arc<WorldTracker>,
    pub semantic: Arc<SemanticStore>,
}

impl MemorySuite {
    #[must_use]
    pub fn new(
        store: Arc<dyn NarrativeStore>,
        llm: Arc<dyn CompletionProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            plot: Arc::new(PlotLedger::new(Arc::clone(&store), Arc::clone(&llm))),
            foreshadow: Arc::new(ForeshadowPlanner::new(Arc::clone(&store), Arc::clone(&llm))),
            characters: Arc::new(CharacterArcTracker::new(Arc::clone(&store), Arc::clone(&llm))),
            power: Arc::new(PowerTracker::new(Arc::clone(&store), Arc::clone(&llm))),
            voice: Arc::new(VoiceTracker::new(Arc::clone(&store))),
            world: Arc::new(WorldTracker::new(Arc::clone(&store), llm)),
            semantic: Arc::new(SemanticStore::new(store, embedder)),
        }
    }

    /// All trackers in context-fragment order.
    #[must_use]
    pub fn trackers(&self) -> Vec<Arc<dyn MemoryTracker>> {
        vec![
            self.plot.clone() as Arc<dyn MemoryTracker>,
            self.foreshadow.clone() as Arc<dyn MemoryTracker>,
            self.characters.clone() as Arc<dyn MemoryTracker>,
            self.power.clone() as Arc<dyn MemoryTracker>,
            self.world.clone() as Arc<dyn MemoryTracker>,
            self.voice.clone() as Arc<dyn MemoryTracker>,
        ]
    }
}
