use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{Value, json};
use tracehub_store::queries::events;
use tracehub_types::{EventEnvelope, validate_payload};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

const MAX_BATCH: usize = 500;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub events: Vec<Value>,
}

/// Batch ingest: validate everything, dedupe against the event table, append
/// the newly accepted events to the stream. Any invalid event rejects the
/// whole batch with per-event diagnostics.
pub async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.events.len() > MAX_BATCH {
        return Err(ApiError::invalid_request(format!(
            "batch exceeds {} events",
            MAX_BATCH
        )));
    }

    let mut envelopes: Vec<EventEnvelope> = Vec::with_capacity(request.events.len());
    let mut diagnostics: Vec<Value> = Vec::new();

    for (index, raw) in request.events.iter().enumerate() {
        let id = raw.get("id").and_then(Value::as_str).unwrap_or_default();
        match serde_json::from_value::<EventEnvelope>(raw.clone()) {
            Ok(envelope) => match validate_payload(&envelope) {
                Ok(()) => envelopes.push(envelope),
                Err(e) => diagnostics.push(json!({
                    "index": index,
                    "id": id,
                    "error": e.to_string(),
                })),
            },
            Err(e) => diagnostics.push(json!({
                "index": index,
                "id": id,
                "error": e.to_string(),
            })),
        }
    }

    if !diagnostics.is_empty() {
        return Err(ApiError::invalid_request("batch contains invalid events")
            .with_details(json!({ "events": diagnostics })));
    }

    if envelopes.is_empty() {
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "ingested": 0, "duplicates": 0 })),
        ));
    }

    let accepted = events::insert_batch(&state.pool, &envelopes).await?;
    let accepted_set: std::collections::HashSet<&str> =
        accepted.iter().map(String::as_str).collect();

    // Append in posted order; only the newly accepted events reach the
    // stream, so replaying a batch cannot double-deliver.
    for envelope in &envelopes {
        if accepted_set.contains(envelope.id.as_str()) {
            state.stream.append(envelope).await.map_err(|e| {
                tracing::error!(event_id = %envelope.id, error = %e, "stream append failed");
                ApiError::internal("stream append failed")
            })?;
        }
    }

    let ingested = accepted.len();
    let duplicates = envelopes.len() - ingested;
    info!(ingested, duplicates, "event batch ingested");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "ingested": ingested, "duplicates": duplicates })),
    ))
}
