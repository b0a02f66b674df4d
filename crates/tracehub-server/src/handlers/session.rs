use tracehub_store::queries::sessions;
use tracehub_store::{TransitionExtras, ensure_workspace_device_link, transition_session};
use tracehub_types::{Lifecycle, SessionEndData, SessionStartData};
use tracing::{debug, warn};

use super::{HandlerContext, HandlerEffects};

/// `session.start`: create the session in `detected` and refresh the
/// workspace-device association (raising the git-hooks prompt when the pair
/// is new).
pub async fn start(ctx: HandlerContext<'_>) -> anyhow::Result<HandlerEffects> {
    let data = match SessionStartData::from_envelope(ctx.event) {
        Ok(data) => data,
        Err(e) => {
            // Validated at ingest; a mismatch here is a poison payload that
            // retrying cannot fix.
            warn!(event_id = %ctx.event.id, error = %e, "dropping undecodable session.start");
            return Ok(HandlerEffects::default());
        }
    };

    let mut tx = ctx.pool.begin().await?;
    let inserted = sessions::insert_detected(
        &mut *tx,
        &data.cc_session_id,
        ctx.workspace_id,
        &ctx.event.device_id,
        &data.cc_session_id,
        data.cwd.as_deref(),
        data.git_branch.as_deref(),
        data.git_remote.as_deref(),
        data.model.as_deref(),
        ctx.event.timestamp,
    )
    .await?;
    ensure_workspace_device_link(
        &mut *tx,
        ctx.workspace_id,
        &ctx.event.device_id,
        data.cwd.as_deref(),
    )
    .await?;
    tx.commit().await?;

    if !inserted {
        debug!(session_id = %data.cc_session_id, "session.start replayed, row already present");
    }

    Ok(HandlerEffects {
        session_id: Some(data.cc_session_id),
        enqueue_pipeline: None,
    })
}

/// `session.end`: advance to `ended` and queue post-processing. Arriving
/// before `session.start` (or twice) surfaces as a CAS no-op, never an error.
pub async fn end(ctx: HandlerContext<'_>) -> anyhow::Result<HandlerEffects> {
    let data = match SessionEndData::from_envelope(ctx.event) {
        Ok(data) => data,
        Err(e) => {
            warn!(event_id = %ctx.event.id, error = %e, "dropping undecodable session.end");
            return Ok(HandlerEffects::default());
        }
    };

    let outcome = transition_session(
        ctx.pool,
        &data.cc_session_id,
        &[Lifecycle::Detected, Lifecycle::Capturing],
        Lifecycle::Ended,
        TransitionExtras {
            ended_at: Some(ctx.event.timestamp),
            duration_ms: data.duration_ms,
            transcript_s3_key: data.transcript_path.clone(),
            ..TransitionExtras::default()
        },
    )
    .await?;

    let enqueue = if outcome.is_applied() {
        Some(data.cc_session_id.clone())
    } else {
        debug!(
            session_id = %data.cc_session_id,
            "session.end was a lifecycle no-op (out of order or replay)"
        );
        None
    };

    Ok(HandlerEffects {
        session_id: Some(data.cc_session_id),
        enqueue_pipeline: enqueue,
    })
}
