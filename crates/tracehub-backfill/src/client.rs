use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Value, json};

/// Thin authenticated client for the tracehub API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestResponse {
    pub ingested: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionStatus {
    pub id: String,
    pub lifecycle: String,
    pub parse_status: String,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("http client build failed")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub async fn ingest_events(&self, events: Vec<Value>) -> Result<IngestResponse> {
        let response = self
            .http
            .post(format!("{}/api/events/ingest", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "events": events }))
            .send()
            .await
            .context("ingest request failed")?;

        if !response.status().is_success() {
            bail!("ingest returned {}: {}", response.status(), body_snippet(response).await);
        }
        response.json().await.context("ingest response decode failed")
    }

    pub async fn upload_transcript(
        &self,
        session_id: &str,
        canonical_id: &str,
        body: Vec<u8>,
    ) -> Result<String> {
        let response = self
            .http
            .post(format!(
                "{}/api/backfill/transcripts/{}",
                self.base_url, session_id
            ))
            .query(&[("canonical_id", canonical_id)])
            .bearer_auth(&self.api_key)
            .body(body)
            .send()
            .await
            .context("transcript upload failed")?;

        if !response.status().is_success() {
            bail!(
                "transcript upload returned {}: {}",
                response.status(),
                body_snippet(response).await
            );
        }

        let payload: Value = response
            .json()
            .await
            .context("upload response decode failed")?;
        payload["s3_key"]
            .as_str()
            .map(str::to_owned)
            .context("upload response missing s3_key")
    }

    pub async fn status_batch(&self, session_ids: &[String]) -> Result<Vec<SessionStatus>> {
        let response = self
            .http
            .post(format!("{}/api/sessions/status-batch", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "session_ids": session_ids }))
            .send()
            .await
            .context("status request failed")?;

        if !response.status().is_success() {
            bail!("status returned {}: {}", response.status(), body_snippet(response).await);
        }

        #[derive(Deserialize)]
        struct StatusResponse {
            sessions: Vec<SessionStatus>,
        }
        let payload: StatusResponse = response
            .json()
            .await
            .context("status response decode failed")?;
        Ok(payload.sessions)
    }

    /// All known session IDs, newest first, following pagination.
    pub async fn list_session_ids(&self) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Page {
            sessions: Vec<Value>,
            next_cursor: Option<String>,
        }

        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut request = self
                .http
                .get(format!("{}/api/sessions", self.base_url))
                .query(&[("limit", "250")])
                .bearer_auth(&self.api_key);
            if let Some(cursor) = &cursor {
                request = request.query(&[("cursor", cursor.as_str())]);
            }

            let response = request.send().await.context("session list failed")?;
            if !response.status().is_success() {
                bail!(
                    "session list returned {}: {}",
                    response.status(),
                    body_snippet(response).await
                );
            }
            let page: Page = response
                .json()
                .await
                .context("session list decode failed")?;

            ids.extend(
                page.sessions
                    .iter()
                    .filter_map(|s| s["id"].as_str().map(str::to_owned)),
            );
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(ids)
    }
}

async fn body_snippet(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    text.chars().take(200).collect()
}
