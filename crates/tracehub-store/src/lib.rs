//! Postgres persistence layer for tracehub.
//!
//! Everything that touches the relational database lives here: identity
//! resolvers, the session lifecycle machine, and the query modules the API
//! and pipeline are built on. SQL is runtime-bound (`sqlx::query` /
//! `query_as`) so the crate builds without a live database.
//!
//! Writes are shaped for at-least-once delivery: inserts are
//! `ON CONFLICT DO NOTHING` on caller-supplied IDs, and state advances go
//! through the compare-and-swap in [`lifecycle`].

mod error;
mod lifecycle;
mod pool;
mod records;
mod resolver;
mod schema;

pub mod queries;

pub use error::{Error, Result};
pub use lifecycle::{
    ResetOutcome, TransitionExtras, TransitionOutcome, fail_session, find_stuck_sessions,
    reset_session_for_reparse, transition_session,
};
pub use pool::connect;
pub use records::{
    ContentBlockRow, DeviceRow, DeviceSummaryRow, EventRow, GitActivityRow, GitSummary,
    SessionRow, SessionStatusRow, TranscriptMessageRow, WorkspaceListRow, WorkspaceRow,
    WorkspaceStats,
};
pub use resolver::{
    ensure_workspace_device_link, resolve_or_create_device, resolve_or_create_workspace,
};
pub use schema::init_schema;
