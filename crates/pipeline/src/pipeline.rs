//! The outline, prose and critique loop with a bounded retry budget.

use std::sync::Arc;

use novelmill_core::text::truncate;
use novelmill_core::{Chapter, CritiqueReport, Outline, Project, Verdict};
use novelmill_llm::CompletionProvider;
use novelmill_memory::MemorySuite;
use novelmill_storage::NarrativeStore;

use crate::architect::Architect;
use crate::config::GenerationConfig;
use crate::context::{ContextAssembler, SectionKind};
use crate::critic::Critic;
use crate::error::PipelineError;
use crate::writer::{Draft, Writer};

/// Feedback carried per failed attempt is capped so retries cannot balloon the prompt.
const FEEDBACK_CHARS: usize = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    DraftingOutline,
    DraftingProse,
    Critiquing,
    Approved,
    /// Same outline, new prose.
    Revise,
    /// New outline.
    Rewrite,
}

/// An approved chapter, not yet committed.
#[derive(Debug, Clone)]
pub struct GeneratedChapter {
    /// Carries the outline and the approving critique.
    pub chapter: Chapter,
    pub attempts: u32,
    pub continued: bool,
    pub context_chars: usize,
    pub trimmed: Vec<SectionKind>,
}

/// Retry budget threaded through one generation run.
struct Budget {
    chapter: u32,
    max_attempts: u32,
    attempt: u32,
    feedback: Vec<String>,
}

impl Budget {
    fn new(chapter: u32, max_attempts: u32) -> Self {
        Self { chapter, max_attempts: max_attempts.max(1), attempt: 1, feedback: Vec::new() }
    }

    /// Record a failed attempt, or fail the chapter when the budget is spent.
    fn spend(&mut self, stage: &str, reason: &str) -> Result<(), PipelineError> {
        let reason = truncate(reason.trim(), FEEDBACK_CHARS);
        if self.attempt >= self.max_attempts {
            return Err(PipelineError::failed(
                self.chapter,
                format!("no approved draft after {} attempts; last {stage}: {reason}", self.attempt),
            ));
        }
        tracing::warn!(
            chapter = self.chapter,
            attempt = self.attempt,
            max_attempts = self.max_attempts,
            stage,
            reason = %reason,
            "attempt rejected, retrying"
        );
        self.feedback.push(format!("Attempt {} ({stage}): {reason}", self.attempt));
        self.attempt += 1;
        Ok(())
    }
}

pub struct GenerationPipeline {
    assembler: ContextAssembler,
    architect: Architect,
    writer: Writer,
    critic: Critic,
    config: GenerationConfig,
}

impl GenerationPipeline {
    #[must_use]
    pub fn new(
        store: Arc<dyn NarrativeStore>,
        memory: MemorySuite,
        llm: Arc<dyn CompletionProvider>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            assembler: ContextAssembler::new(store, memory, config.clone()),
            architect: Architect::new(Arc::clone(&llm)),
            writer: Writer::new(Arc::clone(&llm)),
            critic: Critic::new(llm, config.approval_score),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Produce an approved chapter or a [`PipelineError::ChapterGenerationFailed`].
    pub async fn generate(
        &self,
        project: &Project,
        chapter: u32,
    ) -> Result<GeneratedChapter, PipelineError> {
        let context = self.assembler.assemble(project, chapter).await?;
        let target = self.config.target_for(project.target_words);
        let mut budget = Budget::new(chapter, self.config.max_attempts);
        let mut state = PipelineState::DraftingOutline;
        let mut outline: Option<Outline> = None;
        let mut draft: Option<Draft> = None;
        let mut report: Option<CritiqueReport> = None;

        loop {
            tracing::debug!(chapter, attempt = budget.attempt, state = ?state, "pipeline step");
            state = match state {
                PipelineState::DraftingOutline => {
                    match self.architect.draft(project, &context, target, &budget.feedback).await {
                        Ok(plan) => {
                            outline = Some(plan);
                            PipelineState::DraftingProse
                        },
                        Err(e) => {
                            budget.spend("outline", &e.to_string())?;
                            PipelineState::DraftingOutline
                        },
                    }
                },
                PipelineState::DraftingProse => {
                    let Some(plan) = outline.as_ref() else {
                        state = PipelineState::DraftingOutline;
                        continue;
                    };
                    match self.writer.write(project, &context, plan, target, &budget.feedback).await {
                        Ok(prose) => {
                            draft = Some(prose);
                            PipelineState::Critiquing
                        },
                        Err(e) => {
                            budget.spend("prose", &e.to_string())?;
                            PipelineState::DraftingProse
                        },
                    }
                },
                PipelineState::Critiquing => {
                    let (Some(plan), Some(prose)) = (outline.as_ref(), draft.as_ref()) else {
                        state = PipelineState::DraftingOutline;
                        continue;
                    };
                    let verdict = self.critic.critique(project, &context, plan, &prose.body).await;
                    let next = if verdict.is_approved() {
                        PipelineState::Approved
                    } else if verdict.verdict == Verdict::Rewrite {
                        PipelineState::Rewrite
                    } else {
                        PipelineState::Revise
                    };
                    report = Some(verdict);
                    next
                },
                PipelineState::Revise | PipelineState::Rewrite => {
                    let feedback = report.as_ref().map(|r| r.feedback.clone()).unwrap_or_default();
                    let stage = if state == PipelineState::Rewrite { "critique, rewrite" } else { "critique, revise" };
                    budget.spend(stage, &feedback)?;
                    draft = None;
                    if state == PipelineState::Rewrite {
                        outline = None;
                        PipelineState::DraftingOutline
                    } else {
                        PipelineState::DraftingProse
                    }
                },
                PipelineState::Approved => {
                    let (Some(plan), Some(prose)) = (outline.take(), draft.take()) else {
                        return Err(PipelineError::failed(chapter, "approved without a draft"));
                    };
                    let mut committed = Chapter::new(&project.id, chapter, plan.title.clone(), prose.body);
                    committed.outline = Some(plan);
                    committed.critique = report.take();
                    tracing::info!(
                        project = %project.id,
                        chapter,
                        attempts = budget.attempt,
                        words = committed.word_count,
                        "chapter approved"
                    );
                    return Ok(GeneratedChapter {
                        chapter: committed,
                        attempts: budget.attempt,
                        continued: prose.continued,
                        context_chars: context.text.len(),
                        trimmed: context.trimmed.clone(),
                    });
                },
            };
        }
    }
}
