//! Storage layer for novelmill
//!
//! PostgreSQL + pgvector backend for production runs, and an in-process backend
//! for dry runs and tests. Both implement the same per-concern traits.

pub mod error;
mod memory;
mod pg_migrations;
mod pg_storage;
pub mod traits;
mod vector;


pub use error::StorageError;
pub use memory::MemoryStorage;
pub use pg_storage::PgStorage;
pub use traits::*;
pub use vector::cosine_similarity;
