//! Shared schema types for tracehub.
//!
//! This crate only contains data shapes and the small amount of logic that is
//! inseparable from them (lifecycle transition rules, cursor encoding, event
//! payload decoding). Anything that talks to a database, the network, or the
//! filesystem lives in the crates layered above.

mod cursor;
mod error;
mod event;
mod ids;
mod lifecycle;
mod payload;

pub use cursor::Cursor;
pub use error::{Error, Result};
pub use event::{DeviceHints, EventEnvelope, EventKind, WorkspaceRef};
pub use ids::{is_ulid, new_workspace_id};
pub use lifecycle::{Lifecycle, ParseStatus, TERMINAL_LIFECYCLES};
pub use payload::{
    FileChange, GitCheckoutData, GitCommitData, GitMergeData, GitPushData, SessionEndData,
    SessionStartData, validate_payload,
};
