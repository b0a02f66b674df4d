use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Instant;

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracehub_pipeline::{BlobStore, PipelineQueue};

use crate::stream::EventStream;

/// A live-feed notification emitted after the consumer successfully handles
/// an event.
#[derive(Debug, Clone, Serialize)]
pub struct LiveEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub event_id: String,
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Shared state for the axum server and the consumer.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub stream: EventStream,
    pub queue: Arc<PipelineQueue>,
    pub blobs: Arc<dyn BlobStore>,
    pub api_key: String,
    pub live: broadcast::Sender<LiveEvent>,
    pub ws_clients: Arc<AtomicUsize>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        stream: EventStream,
        queue: Arc<PipelineQueue>,
        blobs: Arc<dyn BlobStore>,
        api_key: String,
    ) -> Self {
        let (live, _) = broadcast::channel(256);
        Self {
            pool,
            stream,
            queue,
            blobs,
            api_key,
            live,
            ws_clients: Arc::new(AtomicUsize::new(0)),
            started_at: Instant::now(),
        }
    }
}
