//! The event handler registry.
//!
//! One handler per event type, registered once at startup. Handlers are
//! idempotent on event ID and treat expected races (duplicate deliveries,
//! out-of-order arrival) as no-ops; an `Err` means infrastructure trouble
//! and earns the delivery another attempt.

mod git;
mod session;

use std::collections::HashMap;

use futures::future::BoxFuture;
use sqlx::PgPool;
use tracehub_types::{EventEnvelope, EventKind};

pub use git::build_activity;

/// What a handler asks the dispatcher to do after its transaction commits.
#[derive(Debug, Default)]
pub struct HandlerEffects {
    /// Session this event ended up associated with, for the live feed.
    pub session_id: Option<String>,
    /// Session to hand to the pipeline queue (set by `session.end`).
    pub enqueue_pipeline: Option<String>,
}

pub struct HandlerContext<'a> {
    pub pool: &'a PgPool,
    pub workspace_id: &'a str,
    pub event: &'a EventEnvelope,
}

pub type HandlerFuture<'a> = BoxFuture<'a, anyhow::Result<HandlerEffects>>;
pub type Handler = for<'a> fn(HandlerContext<'a>) -> HandlerFuture<'a>;

pub struct HandlerRegistry {
    handlers: HashMap<EventKind, Handler>,
}

fn session_start(ctx: HandlerContext<'_>) -> HandlerFuture<'_> {
    Box::pin(session::start(ctx))
}

fn session_end(ctx: HandlerContext<'_>) -> HandlerFuture<'_> {
    Box::pin(session::end(ctx))
}

fn git_activity(ctx: HandlerContext<'_>) -> HandlerFuture<'_> {
    Box::pin(git::activity(ctx))
}

impl HandlerRegistry {
    pub fn new() -> Self {
        let mut handlers: HashMap<EventKind, Handler> = HashMap::new();
        handlers.insert(EventKind::SessionStart, session_start as Handler);
        handlers.insert(EventKind::SessionEnd, session_end as Handler);
        handlers.insert(EventKind::GitCommit, git_activity as Handler);
        handlers.insert(EventKind::GitPush, git_activity as Handler);
        handlers.insert(EventKind::GitCheckout, git_activity as Handler);
        handlers.insert(EventKind::GitMerge, git_activity as Handler);
        Self { handlers }
    }

    pub fn get(&self, kind: EventKind) -> Option<Handler> {
        self.handlers.get(&kind).copied()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_event_kind() {
        let registry = HandlerRegistry::new();
        for kind in [
            EventKind::SessionStart,
            EventKind::SessionEnd,
            EventKind::GitCommit,
            EventKind::GitPush,
            EventKind::GitCheckout,
            EventKind::GitMerge,
        ] {
            assert!(registry.get(kind).is_some(), "no handler for {}", kind);
        }
    }
}
