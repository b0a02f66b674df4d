use std::sync::Arc;

use sqlx::PgPool;
use tracehub_parser::{ParserConfig, SessionStats, parse_transcript};
use tracehub_store::queries::{sessions, transcripts};
use tracehub_store::{TransitionExtras, fail_session, transition_session};
use tracehub_types::{Lifecycle, ParseStatus};
use tracing::{info, warn};

use crate::blob::{BlobStore, backup_key};
use crate::summary::{SummaryConfig, SummaryModel, generate_summary};

/// Everything a pipeline run needs. Built once at startup and shared by the
/// queue workers; tests construct it directly around fakes.
pub struct PipelineDeps {
    pub pool: PgPool,
    pub blobs: Arc<dyn BlobStore>,
    pub summary_config: SummaryConfig,
    pub summary_model: Arc<dyn SummaryModel>,
    pub parser_config: ParserConfig,
}

/// What one pipeline run did. The runner never returns an error; failures
/// land here and, for the fatal ones, on the session row via `fail_session`.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub parse_success: bool,
    pub summary_success: bool,
    pub errors: Vec<String>,
    pub stats: Option<SessionStats>,
    /// Set when preconditions were not met and the session was left
    /// untouched.
    pub skipped: Option<String>,
}

impl PipelineOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skipped: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Run the post-processing pipeline for one session:
/// preconditions -> claim -> download -> parse -> persist -> advance,
/// then best-effort summary and backup.
///
/// Concurrent runs for the same session are safe: the `ended -> parsed`
/// compare-and-swap lets exactly one of them advance the row.
pub async fn run_session_pipeline(deps: &PipelineDeps, session_id: &str) -> PipelineOutcome {
    let mut outcome = PipelineOutcome::default();

    // 1. Preconditions: the session must have ended and carry a transcript.
    let session = match sessions::get(&deps.pool, session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return PipelineOutcome::skipped("session not found"),
        Err(e) => {
            outcome.errors.push(format!("session lookup failed: {}", e));
            return outcome;
        }
    };
    if session.lifecycle != Lifecycle::Ended.as_str() {
        return PipelineOutcome::skipped(format!(
            "session is {}, expected ended",
            session.lifecycle
        ));
    }
    let Some(transcript_key) = session.transcript_s3_key.clone() else {
        return PipelineOutcome::skipped("session has no transcript");
    };

    // 2. Claim. Best-effort: a racing worker is caught by the CAS below.
    if let Err(e) = sessions::claim_for_parsing(&deps.pool, session_id).await {
        warn!(session_id = %session_id, error = %e, "failed to claim session for parsing");
    }

    // 3. Download.
    let body = match deps.blobs.get(&transcript_key).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            let message = format!("transcript download failed: {}", e);
            record_failure(&deps.pool, session_id, &message).await;
            outcome.errors.push(message);
            return outcome;
        }
    };

    // 4. Parse. Line-level problems are diagnostics, not failures.
    let parsed = parse_transcript(&body, &deps.parser_config);
    for error in &parsed.errors {
        outcome
            .errors
            .push(format!("line {}: {}", error.line_number, error.message));
    }

    // 5. Persist, replacing any earlier parse of this session.
    if let Err(e) = transcripts::replace_transcript(&deps.pool, session_id, &parsed).await {
        let message = format!("transcript persist failed: {}", e);
        record_failure(&deps.pool, session_id, &message).await;
        outcome.errors.push(message);
        return outcome;
    }

    // 6. Advance ended -> parsed with the derived stats. Losing the CAS means
    // another worker finished first; leave its result alone.
    let advance = transition_session(
        &deps.pool,
        session_id,
        &[Lifecycle::Ended],
        Lifecycle::Parsed,
        TransitionExtras {
            parse_status: Some(ParseStatus::Completed),
            clear_parse_error: true,
            stats: Some(parsed.stats.clone()),
            ..TransitionExtras::default()
        },
    )
    .await;
    match advance {
        Ok(result) if result.is_applied() => {
            outcome.parse_success = true;
            outcome.stats = Some(parsed.stats.clone());
            info!(
                session_id = %session_id,
                messages = parsed.stats.total_messages,
                "session parsed"
            );
        }
        Ok(_) => {
            warn!(session_id = %session_id, "lost parse race, leaving session as-is");
            outcome
                .errors
                .push("another worker advanced this session first".to_string());
            return outcome;
        }
        Err(e) => {
            outcome.errors.push(format!("lifecycle advance failed: {}", e));
            return outcome;
        }
    }

    // 7. Summary, best-effort. A failure leaves the session at parsed.
    let summary = generate_summary(
        &parsed.messages,
        &parsed.blocks,
        &deps.summary_config,
        deps.summary_model.as_ref(),
    )
    .await;
    match (summary.success, summary.summary) {
        (true, Some(text)) => {
            let applied = transition_session(
                &deps.pool,
                session_id,
                &[Lifecycle::Parsed],
                Lifecycle::Summarized,
                TransitionExtras {
                    summary: Some(text),
                    ..TransitionExtras::default()
                },
            )
            .await;
            match applied {
                Ok(result) if result.is_applied() => outcome.summary_success = true,
                Ok(_) => {
                    warn!(session_id = %session_id, "summary CAS lost, session left at parsed");
                }
                Err(e) => outcome.errors.push(format!("summary persist failed: {}", e)),
            }
        }
        (true, None) => outcome.summary_success = true,
        (false, _) => {
            let error = summary.error.unwrap_or_else(|| "summary failed".to_string());
            warn!(session_id = %session_id, error = %error, "summary generation failed");
            outcome.errors.push(error);
        }
    }

    // 8. Backup, best-effort.
    match serde_json::to_vec(&parsed) {
        Ok(bytes) => {
            let key = backup_key(&transcript_key);
            if let Err(e) = deps.blobs.put(&key, bytes).await {
                warn!(session_id = %session_id, error = %e, "parse backup upload failed");
            }
        }
        Err(e) => warn!(session_id = %session_id, error = %e, "parse backup serialize failed"),
    }

    outcome
}

async fn record_failure(pool: &PgPool, session_id: &str, message: &str) {
    if let Err(e) = fail_session(pool, session_id, message).await {
        warn!(session_id = %session_id, error = %e, "failed to mark session failed");
    }
}
