//! Service layer for novelmill
//!
//! Drives one project forward a chapter at a time on top of the generation
//! pipeline and the memory trackers, and runs many projects as a batch.

#![allow(missing_docs, reason = "Internal crate with self-explanatory API")]
#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(clippy::ref_patterns, reason = "Ref patterns are clearer in some contexts")]
#![allow(missing_debug_implementations, reason = "Internal types")]
#![allow(clippy::manual_let_else, reason = "if let is clearer")]
#![allow(clippy::let_underscore_untyped, reason = "Type is clear from context")]
#![allow(clippy::let_underscore_must_use, reason = "Intentionally ignoring results")]
#![allow(let_underscore_drop, reason = "Intentionally dropping values")]
#![allow(clippy::missing_docs_in_private_items, reason = "Internal crate")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::cognitive_complexity, reason = "Complex async flows are inherent")]
#![allow(clippy::min_ident_chars, reason = "Short error vars are idiomatic")]

mod batch;
mod config;
mod cursor;
mod error;
mod orchestrator;
mod project_service;
mod side_effects;

#[cfg(test)]
mod test_support;

pub use batch::{BatchFailure, BatchReport, BatchTask, run_batch};
pub use config::OrchestratorConfig;
pub use cursor::{CursorPlan, contiguous_prefix, missing_chapters, plan_next_chapter};
pub use error::ServiceError;
pub use orchestrator::{AdvanceOutcome, Orchestrator};
pub use project_service::{ProjectService, ProjectStatus};
pub use side_effects::TrackerOutcome;
