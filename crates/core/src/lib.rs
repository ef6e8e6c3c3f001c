//! Core types for novelmill
//!
//! Narrative domain entities shared across all other crates, plus the
//! structured-output repair used at every model parse boundary.

mod arc;
mod chapter;
mod character;
mod chunk;
pub mod constants;
mod critique;
mod env_config;
mod error;
mod foreshadow;
mod json_utils;
mod outline;
mod power;
mod project;
pub mod text;
mod thread;
mod voice;
mod world;

pub use arc::*;
pub use chapter::*;
pub use character::*;
pub use chunk::*;
pub use critique::*;
pub use env_config::*;
pub use error::*;
pub use foreshadow::*;
pub use json_utils::*;
pub use outline::*;
pub use power::*;
pub use project::*;
pub use thread::*;
pub use voice::*;
pub use world::*;
