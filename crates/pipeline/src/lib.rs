//! Chapter generation for novelmill
//!
//! Assembles a bounded prompt context from narrative memory, then runs the
//! architect, writer and critic steps until a draft is approved or the retry
//! budget runs out.

#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::min_ident_chars, reason = "Short error vars are idiomatic")]

mod architect;
mod config;
mod context;
mod critic;
mod error;
mod hooks;
mod pipeline;
mod writer;

#[cfg(test)]
mod test_support;

pub use architect::{Architect, validate_outline};
pub use config::GenerationConfig;
pub use context::{AssembledContext, Blacklist, ContextAssembler, Section, SectionKind, fit_to_budget};
pub use critic::{Critic, LocalFacts, local_checks};
pub use error::PipelineError;
pub use hooks::{has_hook_signal, infer_hook_technique};
pub use pipeline::{GeneratedChapter, GenerationPipeline, PipelineState};
pub use writer::{Draft, Writer, clean_prose};
