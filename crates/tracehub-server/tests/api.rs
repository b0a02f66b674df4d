//! End-to-end API tests against live Postgres + Redis. Run with:
//!
//! ```sh
//! DATABASE_URL=... REDIS_URL=... cargo test -p tracehub-server -- --ignored
//! ```

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;
use tracehub_pipeline::{MemoryBlobStore, PipelineQueue, QueueConfig};
use tracehub_server::routes;
use tracehub_server::state::AppState;
use tracehub_server::stream::EventStream;
use tracehub_store::init_schema;

const TEST_KEY: &str = "test-api-key";

async fn test_app() -> Option<Router> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let redis_url = std::env::var("REDIS_URL").ok()?;

    let pool = tracehub_store::connect(&database_url).await.ok()?;
    init_schema(&pool).await.ok()?;
    let stream = EventStream::connect(&redis_url).await.ok()?;
    stream.ensure_group().await.ok()?;

    let queue = Arc::new(PipelineQueue::new(QueueConfig {
        max_concurrent: 0,
        max_depth: 50,
    }));
    let state = AppState::new(
        pool,
        stream,
        queue,
        Arc::new(MemoryBlobStore::new()),
        TEST_KEY.to_string(),
    );
    Some(routes::router(state))
}

fn get(path: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
    }
    builder.body(Body::empty()).expect("request build")
}

fn post_json(path: &str, key: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {}", key))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request build")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
#[ignore = "requires DATABASE_URL and REDIS_URL"]
async fn test_missing_bearer_is_401() {
    let Some(app) = test_app().await else { return };

    let response = app.oneshot(get("/api/sessions", None)).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL and REDIS_URL"]
async fn test_wrong_bearer_is_401() {
    let Some(app) = test_app().await else { return };

    let response = app
        .oneshot(get("/api/sessions", Some("wrong-key")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL and REDIS_URL"]
async fn test_limit_out_of_range_is_400() {
    let Some(app) = test_app().await else { return };

    for bad in ["0", "251"] {
        let response = app
            .clone()
            .oneshot(get(&format!("/api/sessions?limit={}", bad), Some(TEST_KEY)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "limit={}", bad);
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL and REDIS_URL"]
async fn test_malformed_cursor_is_400() {
    let Some(app) = test_app().await else { return };

    let response = app
        .oneshot(get("/api/timeline?cursor=%40%40nope%40%40", Some(TEST_KEY)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid cursor");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL and REDIS_URL"]
async fn test_empty_ingest_batch() {
    let Some(app) = test_app().await else { return };

    let response = app
        .oneshot(post_json(
            "/api/events/ingest",
            TEST_KEY,
            serde_json::json!({ "events": [] }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["ingested"], 0);
    assert_eq!(body["duplicates"], 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL and REDIS_URL"]
async fn test_invalid_event_rejects_whole_batch() {
    let Some(app) = test_app().await else { return };

    let fixture = tracehub_testing::EventFixture::default();
    let good = serde_json::to_value(fixture.git_commit(
        "evt-batch-good",
        "deadbeef",
        chrono::Utc::now(),
    ))
    .expect("serialize fixture");
    let bad = serde_json::json!({
        "id": "evt-batch-bad",
        "type": "git.commit",
        "timestamp": "2026-03-01T12:00:01Z",
        "device_id": "dev-1",
        "workspace": {"canonical_id": "github.com/u/r"},
        "data": {"message": "no hash"},
    });

    let response = app
        .oneshot(post_json(
            "/api/events/ingest",
            TEST_KEY,
            serde_json::json!({ "events": [good, bad] }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let diagnostics = body["details"]["events"].as_array().expect("diagnostics");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["index"], 1);
    assert_eq!(diagnostics[0]["id"], "evt-batch-bad");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL and REDIS_URL"]
async fn test_prompts_pending_requires_device_id() {
    let Some(app) = test_app().await else { return };

    let response = app
        .oneshot(get("/api/prompts/pending", Some(TEST_KEY)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL and REDIS_URL"]
async fn test_timeline_empty_shape() {
    let Some(app) = test_app().await else { return };

    let response = app
        .oneshot(get(
            "/api/timeline?workspace_id=01JD0A7GK2M3N4P5Q6R7S8T9VW",
            Some(TEST_KEY),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["items"], serde_json::json!([]));
    assert_eq!(body["next_cursor"], serde_json::Value::Null);
    assert_eq!(body["has_more"], false);
}
