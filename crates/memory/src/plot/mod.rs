//! Plot & Beat Ledger: chapter bridge, synopsis, arc plans, plot threads and beat cooldowns.

mod arc;
mod beats;
mod summary;
mod threads;

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use novelmill_core::constants::SYNOPSIS_REFRESH_INTERVAL;
use novelmill_core::{
    ArcPlan, BeatUsage, ChapterSummary, PlotThread, Project, Synopsis, ThreadPriority,
    ThreadStatus, arc_index,
};
use novelmill_llm::CompletionProvider;
use novelmill_storage::NarrativeStore;

pub use beats::{BeatPlan, detect_beats, plan_beats};
pub use threads::{rank_threads, score_thread};

use crate::error::TrackerError;
use crate::structured::ask;
use crate::tracker::{CommittedChapter, FragmentQuery, MemoryTracker};

/// Owns chapter summaries, the synopsis, arc plans, plot threads and beat usage.
pub struct PlotLedger {
    store: Arc<dyn NarrativeStore>,
    llm: Arc<dyn CompletionProvider>,
}

impl PlotLedger {
    #[must_use]
    pub fn new(store: Arc<dyn NarrativeStore>, llm: Arc<dyn CompletionProvider>) -> Self {
        Self { store, llm }
    }

    /// Summary of the chapter preceding `chapter`, carrying the bridge hook.
    pub async fn bridge(
        &self,
        project_id: &str,
        chapter: u32,
    ) -> Result<Option<ChapterSummary>, TrackerError> {
        if chapter <= 1 {
            return Ok(None);
        }
        Ok(self.store.get_chapter_summary(project_id, chapter - 1).await?)
    }

    pub async fn synopsis(&self, project_id: &str) -> Result<Option<Synopsis>, TrackerError> {
        Ok(self.store.get_synopsis(project_id).await?)
    }

    /// Load the plan of the arc containing `chapter`, planning it first if missing.
    pub async fn ensure_arc_plan(
        &self,
        project: &Project,
        chapter: u32,
    ) -> Result<ArcPlan, TrackerError> {
        let index = arc_index(chapter);
        if let Some(plan) = self.store.get_arc_plan(&project.id, index).await? {
            return Ok(plan);
        }
        let threads = self.store.list_threads(&project.id).await?;
        let synopsis = self.store.get_synopsis(&project.id).await?;
        let prompt = arc::arc_prompt(project, index, synopsis.as_ref(), &threads);
        let plan = match ask::<arc::ArcRecord>(self.llm.as_ref(), prompt, 4096).await {
            Ok(record) => arc::normalize_plan(&project.id, index, record),
            Err(e) => {
                tracing::warn!(project = %project.id, arc = index, error = %e, "arc planning failed, using synthetic plan");
                arc::synthetic_plan(&project.id, index, &threads)
            },
        };
        self.store.save_arc_plan(&plan).await?;
        tracing::info!(project = %project.id, arc = index, theme = %plan.theme, "arc plan saved");
        Ok(plan)
    }

    async fn write_summary(
        &self,
        chapter: &CommittedChapter,
        threads: &[PlotThread],
    ) -> Result<summary::SummaryRecord, TrackerError> {
        let prompt = summary::summary_prompt(chapter, threads);
        let record = match ask::<summary::SummaryRecord>(self.llm.as_ref(), prompt, 1500).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(project = %chapter.project_id, chapter = chapter.number, error = %e, "summary call failed, using outline fallback");
                summary::fallback_summary(chapter)
            },
        };
        let persisted = summary::to_chapter_summary(chapter, record.clone());
        self.store.upsert_chapter_summary(&persisted).await?;
        Ok(record)
    }

    async fn update_threads(
        &self,
        chapter: &CommittedChapter,
        known: Vec<PlotThread>,
        record: &summary::SummaryRecord,
    ) -> Result<(), TrackerError> {
        for mut thread in known {
            if !thread.status.is_active() || thread.last_touched_chapter >= chapter.number {
                continue;
            }
            let named = record.threads_touched.iter().any(|t| t.trim().eq_ignore_ascii_case(&thread.title));
            if named || threads::is_touched(&thread, &chapter.body, &chapter.cast, &chapter.protagonist) {
                thread.last_touched_chapter = chapter.number;
                if thread.status == ThreadStatus::Open {
                    thread.status = ThreadStatus::Developing;
                }
                self.store.upsert_thread(&thread).await?;
            }
        }

        let existing = self.store.list_threads(&chapter.project_id).await?;
        for new in &record.new_threads {
            let title = new.title.trim();
            if title.is_empty() || existing.iter().any(|t| t.title.eq_ignore_ascii_case(title)) {
                continue;
            }
            let thread = PlotThread {
                id: uuid::Uuid::new_v4().to_string(),
                project_id: chapter.project_id.clone(),
                title: title.to_owned(),
                description: new.description.trim().to_owned(),
                priority: ThreadPriority::Sub,
                status: ThreadStatus::Open,
                related_characters: new.related_characters.clone(),
                introduced_chapter: chapter.number,
                last_touched_chapter: chapter.number,
                payoff_deadline: new.payoff_in.map(|n| chapter.number.saturating_add(n.max(1))),
            };
            tracing::debug!(project = %chapter.project_id, title = %thread.title, "new plot thread");
            self.store.upsert_thread(&thread).await?;
        }
        Ok(())
    }

    async fn record_beats(&self, chapter: &CommittedChapter) -> Result<(), TrackerError> {
        for beat in detect_beats(&chapter.body) {
            self.store.record_beat(&BeatUsage::new(&chapter.project_id, beat, chapter.number)).await?;
        }
        Ok(())
    }

    async fn refresh_synopsis(&self, chapter: &CommittedChapter) -> Result<(), TrackerError> {
        let existing = self.store.get_synopsis(&chapter.project_id).await?;
        if !summary::synopsis_due(chapter.number, existing.as_ref()) {
            return Ok(());
        }
        let summaries = self
            .store
            .recent_summaries(
                &chapter.project_id,
                chapter.number + 1,
                SYNOPSIS_REFRESH_INTERVAL as usize,
            )
            .await?;
        let prompt = summary::synopsis_prompt(existing.as_ref(), &summaries, &chapter.protagonist);
        let refreshed = match ask::<summary::SynopsisRecord>(self.llm.as_ref(), prompt, 2000).await {
            Ok(record) if !record.summary.trim().is_empty() => {
                Some(summary::to_synopsis(&chapter.project_id, chapter.number, record))
            },
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(project = %chapter.project_id, chapter = chapter.number, error = %e, "synopsis refresh failed");
                None
            },
        };
        let synopsis = match (refreshed, existing) {
            (Some(synopsis), _) => synopsis,
            (None, Some(_)) => return Ok(()),
            (None, None) => summary::fallback_synopsis(&chapter.project_id, chapter.number, &summaries),
        };
        self.store.save_synopsis(&synopsis).await?;
        Ok(())
    }
}

#[async_trait]
impl MemoryTracker for PlotLedger {
    fn name(&self) -> &'static str {
        "plot"
    }

    async fn on_chapter_committed(&self, chapter: &CommittedChapter) -> Result<(), TrackerError> {
        let threads = self.store.list_threads(&chapter.project_id).await?;
        let record = self.write_summary(chapter, &threads).await?;
        self.update_threads(chapter, threads, &record).await?;
        self.record_beats(chapter).await?;
        self.refresh_synopsis(chapter).await
    }

    async fn context_fragment(
        &self,
        query: &FragmentQuery<'_>,
    ) -> Result<Option<String>, TrackerError> {
        let project_id = query.project.id.as_str();
        let threads = self.store.list_threads(project_id).await?;
        let since = query.chapter.saturating_sub(beats::max_cooldown());
        let usages = self.store.list_beats(project_id, since).await?;
        let plan = plan_beats(&usages, query.chapter);

        let mut out = String::new();
        let ranked = rank_threads(&threads, query.chapter, query.cast);
        if !ranked.is_empty() {
            out.push_str("ACTIVE PLOT THREADS (most relevant first):\n");
            for (_, thread) in &ranked {
                let _ = write!(out, "- {} [{}, {}]", thread.title, thread.priority.as_str(), thread.status.as_str());
                match thread.payoff_deadline {
                    Some(d) if d < query.chapter => {
                        let _ = write!(out, " OVERDUE since chapter {d}, pay it off now");
                    },
                    Some(d) => {
                        let _ = write!(out, " due by chapter {d}");
                    },
                    None => {},
                }
                if !thread.description.is_empty() {
                    let _ = write!(out, ": {}", thread.description);
                }
                out.push('\n');
            }
        }
        if !plan.suggested.is_empty() {
            let names: Vec<&str> = plan.suggested.iter().map(|b| b.as_str()).collect();
            let _ = writeln!(out, "FRESH BEATS you may use: {}", names.join(", "));
        }
        if !plan.cooling.is_empty() {
            let names: Vec<String> = plan
                .cooling
                .iter()
                .map(|(b, until)| format!("{} (until chapter {until})", b.as_str()))
                .collect();
            let _ = writeln!(out, "AVOID these beats, used too recently: {}", names.join(", "));
        }
        Ok((!out.is_empty()).then_some(out))
    }
}
