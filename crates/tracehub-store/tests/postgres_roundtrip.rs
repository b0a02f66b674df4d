//! Integration tests against a live Postgres. Run with:
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/tracehub_test cargo test -p tracehub-store -- --ignored
//! ```

use chrono::{Duration, Utc};
use tracehub_store::queries::{git, sessions};
use tracehub_store::{
    TransitionExtras, TransitionOutcome, ensure_workspace_device_link, fail_session, init_schema,
    reset_session_for_reparse, resolve_or_create_device, resolve_or_create_workspace,
    transition_session,
};
use tracehub_types::Lifecycle;

async fn test_pool() -> Option<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = tracehub_store::connect(&url).await.ok()?;
    init_schema(&pool).await.ok()?;
    Some(pool)
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_workspace_resolution_is_idempotent() {
    let Some(pool) = test_pool().await else { return };
    let canonical = unique("github.com/acme/repo");

    let first = resolve_or_create_workspace(&pool, &canonical, None, None)
        .await
        .unwrap();
    let second = resolve_or_create_workspace(&pool, &canonical, Some("other-name"), None)
        .await
        .unwrap();

    // Same canonical ID resolves to the same internal ID; hints only apply
    // on insert.
    assert_eq!(first, second);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_lifecycle_cas_and_reset() {
    let Some(pool) = test_pool().await else { return };

    let canonical = unique("github.com/acme/lifecycle");
    let workspace_id = resolve_or_create_workspace(&pool, &canonical, None, None)
        .await
        .unwrap();
    let device_id = resolve_or_create_device(&pool, &unique("dev"), None)
        .await
        .unwrap();
    ensure_workspace_device_link(&pool, &workspace_id, &device_id, Some("/tmp/acme"))
        .await
        .unwrap();

    let session_id = unique("cc");
    sessions::insert_detected(
        &pool,
        &session_id,
        &workspace_id,
        &device_id,
        &session_id,
        Some("/tmp/acme"),
        Some("main"),
        None,
        None,
        Utc::now(),
    )
    .await
    .unwrap();

    // detected -> ended succeeds.
    let outcome = transition_session(
        &pool,
        &session_id,
        &[Lifecycle::Detected, Lifecycle::Capturing],
        Lifecycle::Ended,
        TransitionExtras {
            ended_at: Some(Utc::now()),
            duration_ms: Some(60_000),
            transcript_s3_key: Some("transcripts/x/y/raw.jsonl".to_string()),
            ..TransitionExtras::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            lifecycle: Lifecycle::Ended
        }
    );

    // A second identical CAS is a no-op, not an error.
    let replay = transition_session(
        &pool,
        &session_id,
        &[Lifecycle::Detected, Lifecycle::Capturing],
        Lifecycle::Ended,
        TransitionExtras::default(),
    )
    .await
    .unwrap();
    assert!(!replay.is_applied());

    // Fail, then reset back to ended for reparse.
    fail_session(&pool, &session_id, "parse exploded").await.unwrap();
    let session = sessions::get(&pool, &session_id).await.unwrap().unwrap();
    assert_eq!(session.lifecycle, "failed");
    assert_eq!(session.parse_status, "failed");

    let reset = reset_session_for_reparse(&pool, &session_id).await.unwrap();
    assert!(reset.reset);
    assert_eq!(reset.previous_lifecycle, Some(Lifecycle::Failed));

    let session = sessions::get(&pool, &session_id).await.unwrap().unwrap();
    assert_eq!(session.lifecycle, "ended");
    assert_eq!(session.parse_status, "pending");
    assert!(session.parse_error.is_none());
    // The transcript pointer survives the reset.
    assert_eq!(
        session.transcript_s3_key.as_deref(),
        Some("transcripts/x/y/raw.jsonl")
    );
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_correlator_scope() {
    let Some(pool) = test_pool().await else { return };

    let canonical = unique("github.com/acme/correlate");
    let workspace_id = resolve_or_create_workspace(&pool, &canonical, None, None)
        .await
        .unwrap();
    let device_id = resolve_or_create_device(&pool, &unique("dev"), None)
        .await
        .unwrap();
    ensure_workspace_device_link(&pool, &workspace_id, &device_id, None)
        .await
        .unwrap();

    let started = Utc::now() - Duration::minutes(10);
    let session_id = unique("cc");
    sessions::insert_detected(
        &pool,
        &session_id,
        &workspace_id,
        &device_id,
        &session_id,
        None,
        None,
        None,
        None,
        started,
    )
    .await
    .unwrap();

    // Event after session start correlates.
    let hit = git::correlate_session(&pool, &workspace_id, &device_id, Utc::now())
        .await
        .unwrap();
    assert_eq!(hit.as_deref(), Some(session_id.as_str()));

    // Event before session start does not.
    let miss = git::correlate_session(
        &pool,
        &workspace_id,
        &device_id,
        started - Duration::minutes(1),
    )
    .await
    .unwrap();
    assert!(miss.is_none());

    // An ended session no longer correlates.
    transition_session(
        &pool,
        &session_id,
        &[Lifecycle::Detected, Lifecycle::Capturing],
        Lifecycle::Ended,
        TransitionExtras::default(),
    )
    .await
    .unwrap();
    let after_end = git::correlate_session(&pool, &workspace_id, &device_id, Utc::now())
        .await
        .unwrap();
    assert!(after_end.is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_git_activity_idempotent_on_event_id() {
    let Some(pool) = test_pool().await else { return };

    let canonical = unique("github.com/acme/gitdup");
    let workspace_id = resolve_or_create_workspace(&pool, &canonical, None, None)
        .await
        .unwrap();
    let device_id = resolve_or_create_device(&pool, &unique("dev"), None)
        .await
        .unwrap();

    let activity = git::NewGitActivity {
        id: unique("evt"),
        workspace_id: workspace_id.clone(),
        device_id: device_id.clone(),
        session_id: None,
        activity_type: "commit".to_string(),
        branch: Some("main".to_string()),
        commit_sha: Some("deadbeef".to_string()),
        message: Some("initial".to_string()),
        files_changed: Some(1),
        insertions: Some(2),
        deletions: Some(0),
        timestamp: Utc::now(),
        data: serde_json::json!({}),
    };

    assert!(git::insert_activity(&pool, &activity).await.unwrap());
    // Second insertion of the same event leaves row count unchanged.
    assert!(!git::insert_activity(&pool, &activity).await.unwrap());
}
