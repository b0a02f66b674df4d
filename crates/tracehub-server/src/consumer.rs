//! The event dispatcher: a single long-lived task draining the stream's
//! consumer group into the typed handlers.
//!
//! Delivery is at-least-once. A handled entry is acked; a failed one stays
//! pending and is reclaimed on later iterations until it either succeeds or
//! exhausts its deliveries and lands on the dead-letter list.

use serde_json::json;
use tokio::sync::watch;
use tracehub_store::queries::events;
use tracehub_store::{resolve_or_create_device, resolve_or_create_workspace};
use tracehub_types::EventEnvelope;
use tracing::{debug, error, info, warn};

use crate::handlers::{HandlerContext, HandlerEffects, HandlerRegistry};
use crate::state::{AppState, LiveEvent};
use crate::stream::StreamEntry;

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub consumer_name: String,
    pub batch_size: usize,
    pub block_ms: u64,
    pub max_deliveries: u64,
    /// Idle time before a pending entry may be reclaimed from a dead worker.
    pub reclaim_idle_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            consumer_name: format!("consumer-{}", std::process::id()),
            batch_size: 16,
            block_ms: 5000,
            max_deliveries: 5,
            reclaim_idle_ms: 60_000,
        }
    }
}

/// Run the consumer loop until `shutdown` flips. The blocking read's timeout
/// bounds how long shutdown can take.
pub async fn run(
    state: AppState,
    registry: HandlerRegistry,
    config: ConsumerConfig,
    shutdown: watch::Receiver<bool>,
) {
    let mut conn = match state.stream.consumer_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            error!(error = %e, "consumer could not open its stream connection");
            return;
        }
    };

    info!(consumer = %config.consumer_name, "event consumer started");

    while !*shutdown.borrow() {
        if let Err(e) = reclaim_pass(&state, &registry, &config, &mut conn).await {
            warn!(error = %e, "reclaim pass failed");
        }

        match state
            .stream
            .read_group(
                &mut conn,
                &config.consumer_name,
                config.batch_size,
                config.block_ms,
            )
            .await
        {
            Ok(entries) => {
                for entry in entries {
                    process_entry(&state, &registry, &config, &mut conn, entry).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "stream read failed, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }

    info!(consumer = %config.consumer_name, "event consumer stopped");
}

async fn process_entry(
    state: &AppState,
    registry: &HandlerRegistry,
    config: &ConsumerConfig,
    conn: &mut redis::aio::MultiplexedConnection,
    entry: StreamEntry,
) {
    let envelope: EventEnvelope = match serde_json::from_str(&entry.payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            // Unknown or malformed event types cannot be handled by anyone;
            // ack so they stop redelivering.
            warn!(entry = %entry.id, error = %e, "unhandled stream payload, acking");
            ack(state, conn, &entry.id).await;
            return;
        }
    };

    match handle_event(state, registry, &envelope).await {
        Ok(effects) => {
            broadcast(state, &envelope, &effects);
            ack(state, conn, &entry.id).await;
        }
        Err(e) => {
            // Leave unacked; the reclaim pass retries it and eventually
            // dead-letters after max deliveries.
            warn!(
                event_id = %envelope.id,
                event_type = %envelope.kind,
                max_deliveries = config.max_deliveries,
                error = %e,
                "event handling failed, leaving for redelivery"
            );
        }
    }
}

/// Resolve identities, dispatch to the handler, stamp the event row, apply
/// effects.
pub async fn handle_event(
    state: &AppState,
    registry: &HandlerRegistry,
    envelope: &EventEnvelope,
) -> anyhow::Result<HandlerEffects> {
    let workspace_id = resolve_or_create_workspace(
        &state.pool,
        &envelope.workspace.canonical_id,
        envelope.workspace.display_name.as_deref(),
        envelope.workspace.default_branch.as_deref(),
    )
    .await?;
    resolve_or_create_device(&state.pool, &envelope.device_id, envelope.device.as_ref()).await?;

    let Some(handler) = registry.get(envelope.kind) else {
        warn!(event_type = %envelope.kind, "no handler registered, skipping");
        return Ok(HandlerEffects::default());
    };

    let effects = handler(HandlerContext {
        pool: &state.pool,
        workspace_id: &workspace_id,
        event: envelope,
    })
    .await?;

    events::set_workspace(&state.pool, &envelope.id, &workspace_id).await?;

    if let Some(session_id) = &effects.enqueue_pipeline {
        state.queue.enqueue(session_id);
    }

    debug!(event_id = %envelope.id, event_type = %envelope.kind, "event handled");
    Ok(effects)
}

/// Retry or bury entries a previous delivery left pending.
async fn reclaim_pass(
    state: &AppState,
    registry: &HandlerRegistry,
    config: &ConsumerConfig,
    conn: &mut redis::aio::MultiplexedConnection,
) -> anyhow::Result<()> {
    let pending = state.stream.pending(conn, 50).await?;
    if pending.is_empty() {
        return Ok(());
    }

    let (dead, retry): (Vec<_>, Vec<_>) = pending
        .into_iter()
        .partition(|entry| entry.times_delivered >= config.max_deliveries);

    if !dead.is_empty() {
        let ids: Vec<String> = dead.iter().map(|entry| entry.id.clone()).collect();
        let claimed = state
            .stream
            .claim(conn, &config.consumer_name, 0, &ids)
            .await?;
        for entry in claimed {
            let delivery_count = dead
                .iter()
                .find(|d| d.id == entry.id)
                .map(|d| d.times_delivered)
                .unwrap_or(config.max_deliveries);
            let body = json!({
                "payload": entry.payload,
                "delivery_count": delivery_count,
                "dead_lettered_at": chrono::Utc::now(),
            })
            .to_string();
            if let Err(e) = state.stream.dead_letter(&body).await {
                warn!(entry = %entry.id, error = %e, "dead letter push failed");
                continue;
            }
            error!(entry = %entry.id, deliveries = delivery_count, "event dead-lettered");
            ack(state, conn, &entry.id).await;
        }
    }

    if !retry.is_empty() {
        let ids: Vec<String> = retry.iter().map(|entry| entry.id.clone()).collect();
        let claimed = state
            .stream
            .claim(conn, &config.consumer_name, config.reclaim_idle_ms, &ids)
            .await?;
        for entry in claimed {
            process_entry(state, registry, config, conn, entry).await;
        }
    }

    Ok(())
}

fn broadcast(state: &AppState, envelope: &EventEnvelope, effects: &HandlerEffects) {
    let _ = state.live.send(LiveEvent {
        event_type: envelope.kind.to_string(),
        event_id: envelope.id.clone(),
        workspace_id: envelope.workspace.canonical_id.clone(),
        session_id: effects.session_id.clone(),
    });
}

async fn ack(state: &AppState, conn: &mut redis::aio::MultiplexedConnection, entry_id: &str) {
    if let Err(e) = state.stream.ack(conn, entry_id).await {
        warn!(entry = %entry_id, error = %e, "stream ack failed");
    }
}
