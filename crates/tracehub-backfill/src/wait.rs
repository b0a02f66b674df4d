use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::client::ApiClient;

#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WaitSummary {
    pub parsed: usize,
    pub summarized: usize,
    pub archived: usize,
    pub failed: usize,
    pub pending: usize,
}

#[derive(Debug)]
pub struct WaitReport {
    pub completed: bool,
    pub timed_out: bool,
    pub aborted: bool,
    pub summary: WaitSummary,
}

/// Poll the batch-status endpoint until every session reaches a terminal
/// lifecycle, the timeout elapses, or the abort flag flips.
pub async fn wait_for_pipeline_completion(
    client: &ApiClient,
    session_ids: &[String],
    options: &WaitOptions,
    abort: &Arc<AtomicBool>,
) -> Result<WaitReport> {
    let deadline = Instant::now() + Duration::from_millis(options.timeout_ms);

    loop {
        let statuses = client.status_batch(session_ids).await?;
        let summary = summarize(session_ids, &statuses.iter().map(|s| (s.id.as_str(), s.lifecycle.as_str())).collect::<Vec<_>>());

        if summary.pending == 0 {
            return Ok(WaitReport {
                completed: true,
                timed_out: false,
                aborted: false,
                summary,
            });
        }
        if abort.load(Ordering::SeqCst) {
            return Ok(WaitReport {
                completed: false,
                timed_out: false,
                aborted: true,
                summary,
            });
        }
        if Instant::now() >= deadline {
            return Ok(WaitReport {
                completed: false,
                timed_out: true,
                aborted: false,
                summary,
            });
        }

        tokio::time::sleep(Duration::from_millis(options.poll_interval_ms)).await;
    }
}

/// Tally lifecycles; sessions missing from the response count as pending.
pub fn summarize(session_ids: &[String], statuses: &[(&str, &str)]) -> WaitSummary {
    let mut summary = WaitSummary::default();
    for id in session_ids {
        let lifecycle = statuses
            .iter()
            .find(|(sid, _)| sid == id)
            .map(|(_, lifecycle)| *lifecycle);
        match lifecycle {
            Some("parsed") => summary.parsed += 1,
            Some("summarized") => summary.summarized += 1,
            Some("archived") => summary.archived += 1,
            Some("failed") => summary.failed += 1,
            _ => summary.pending += 1,
        }
    }
    summary
}
