//! Post-processing pipeline for ended sessions.
//!
//! One entry point, [`run_session_pipeline`], takes a session from `ended`
//! through download, parse, persist, and lifecycle advance, with best-effort
//! summary and backup steps behind it. A bounded [`PipelineQueue`] schedules
//! runs. The runner never returns an error: every failure mode is folded
//! into the returned [`PipelineOutcome`] and, where it matters, the session's
//! own lifecycle.

mod blob;
mod error;
mod queue;
mod runner;
mod summary;

pub use blob::{BlobStore, MemoryBlobStore, OpendalStore, backup_key};
pub use error::{Error, Result};
pub use queue::{PipelineQueue, QueueConfig};
pub use runner::{PipelineDeps, PipelineOutcome, run_session_pipeline};
pub use summary::{
    AnthropicModel, SummaryConfig, SummaryModel, SummaryOutcome, generate_summary,
    render_transcript,
};
