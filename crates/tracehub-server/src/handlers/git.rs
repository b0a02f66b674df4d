use serde_json::json;
use tracehub_store::queries::git::{self, NewGitActivity};
use tracehub_store::queries::events;
use tracehub_types::{
    EventEnvelope, EventKind, GitCheckoutData, GitCommitData, GitMergeData, GitPushData,
};
use tracing::warn;

use super::{HandlerContext, HandlerEffects};

/// Shared handler for the four git event types: correlate against a live
/// session, record one activity row keyed by the event ID, and back-fill
/// `events.session_id` when correlation hit.
pub async fn activity(ctx: HandlerContext<'_>) -> anyhow::Result<HandlerEffects> {
    let session_id = git::correlate_session(
        ctx.pool,
        ctx.workspace_id,
        &ctx.event.device_id,
        ctx.event.timestamp,
    )
    .await?;

    let activity = match build_activity(ctx.event, ctx.workspace_id, session_id.clone()) {
        Ok(activity) => activity,
        Err(e) => {
            warn!(event_id = %ctx.event.id, error = %e, "dropping undecodable git event");
            return Ok(HandlerEffects::default());
        }
    };

    let mut tx = ctx.pool.begin().await?;
    git::insert_activity(&mut *tx, &activity).await?;
    if let Some(session_id) = &session_id {
        events::set_session(&mut *tx, &ctx.event.id, session_id).await?;
    }
    tx.commit().await?;

    Ok(HandlerEffects {
        session_id,
        enqueue_pipeline: None,
    })
}

/// Normalize a git event payload into the activity row columns. Type-specific
/// leftovers go into the JSONB `data` column.
pub fn build_activity(
    event: &EventEnvelope,
    workspace_id: &str,
    session_id: Option<String>,
) -> tracehub_types::Result<NewGitActivity> {
    let base = NewGitActivity {
        id: event.id.clone(),
        workspace_id: workspace_id.to_string(),
        device_id: event.device_id.clone(),
        session_id,
        activity_type: String::new(),
        branch: None,
        commit_sha: None,
        message: None,
        files_changed: None,
        insertions: None,
        deletions: None,
        timestamp: event.timestamp,
        data: json!({}),
    };

    let activity = match event.kind {
        EventKind::GitCommit => {
            let data = GitCommitData::from_envelope(event)?;
            NewGitActivity {
                activity_type: "commit".to_string(),
                branch: data.branch.clone(),
                commit_sha: Some(data.hash.clone()),
                message: data.message.clone(),
                files_changed: data.files_changed,
                insertions: data.insertions,
                deletions: data.deletions,
                data: json!({
                    "author_name": data.author_name,
                    "author_email": data.author_email,
                    "file_list": data.file_list,
                }),
                ..base
            }
        }
        EventKind::GitPush => {
            let data = GitPushData::from_envelope(event)?;
            NewGitActivity {
                activity_type: "push".to_string(),
                branch: data.branch.clone(),
                data: json!({
                    "remote": data.remote,
                    "commit_count": data.commit_count,
                    "commits": data.commits,
                }),
                ..base
            }
        }
        EventKind::GitCheckout => {
            let data = GitCheckoutData::from_envelope(event)?;
            NewGitActivity {
                activity_type: "checkout".to_string(),
                branch: data.branch().map(str::to_owned),
                data: json!({
                    "from_ref": data.from_ref,
                    "to_ref": data.to_ref,
                    "from_branch": data.from_branch,
                    "to_branch": data.to_branch,
                }),
                ..base
            }
        }
        EventKind::GitMerge => {
            let data = GitMergeData::from_envelope(event)?;
            NewGitActivity {
                activity_type: "merge".to_string(),
                branch: data.into_branch.clone(),
                commit_sha: data.merge_commit.clone(),
                message: data.message.clone(),
                files_changed: data.files_changed,
                data: json!({
                    "merged_branch": data.merged_branch,
                    "had_conflicts": data.had_conflicts,
                }),
                ..base
            }
        }
        EventKind::SessionStart | EventKind::SessionEnd => {
            return Err(tracehub_types::Error::InvalidPayload {
                event_type: event.kind.to_string(),
                detail: "not a git event".to_string(),
            });
        }
    };

    Ok(activity)
}
