//! Pull Request descriptions from diffs of any size.
//!
//! The diff is split into segments that fit the model's context window, each
//! segment is summarized on its own, and the summaries are composed into one
//! description in a final request.

pub mod budget;
pub mod error;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod split;
pub mod tokens;

pub use error::{PrError, Result};
pub use orchestrator::{Orchestrator, RunResult, RunSettings, RunState, SplitMode};
