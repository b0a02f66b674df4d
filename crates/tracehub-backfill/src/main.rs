//! Backfill CLI: discover historical transcripts on disk and replay them
//! through the server's ingest pipeline, then wait for the pipeline to catch
//! up.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use tracehub_backfill::client::ApiClient;
use tracehub_backfill::{ingest, resolve, scan, wait};

#[derive(Parser)]
#[command(name = "tracehub-backfill", version, about = "Backfill historical sessions into tracehub")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug, Clone)]
struct ServerArgs {
    /// Base URL of the tracehub server.
    #[arg(long, env = "TRACEHUB_SERVER_URL", default_value = "http://127.0.0.1:4680")]
    server_url: String,

    /// API key (shared secret).
    #[arg(long, env = "TRACEHUB_API_KEY")]
    api_key: String,
}

#[derive(Subcommand)]
enum Command {
    /// List transcripts that would be backfilled, without posting anything.
    Scan {
        /// Root of on-disk session transcripts.
        #[arg(long)]
        projects_root: Option<PathBuf>,

        /// Skip transcripts modified more recently than this (live sessions).
        #[arg(long, default_value_t = 300_000)]
        skip_active_threshold_ms: u64,
    },

    /// Discover, upload, ingest, and wait for pipeline completion.
    Run {
        #[command(flatten)]
        server: ServerArgs,

        #[arg(long)]
        projects_root: Option<PathBuf>,

        /// Device ID to attribute backfilled sessions to.
        #[arg(long, env = "TRACEHUB_DEVICE_ID")]
        device_id: String,

        #[arg(long, default_value_t = 300_000)]
        skip_active_threshold_ms: u64,

        /// Concurrent session uploads.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Pause between session posts, for gentle servers.
        #[arg(long, default_value_t = 0)]
        throttle_ms: u64,

        #[arg(long, default_value_t = 2000)]
        poll_interval_ms: u64,

        #[arg(long, default_value_t = 600_000)]
        timeout_ms: u64,

        /// Skip the wait-for-completion phase.
        #[arg(long)]
        no_wait: bool,
    },

    /// Show lifecycle status for a session (full ID or unique prefix).
    Status {
        #[command(flatten)]
        server: ServerArgs,

        /// Session identifier: full ID or a unique prefix.
        reference: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scan {
            projects_root,
            skip_active_threshold_ms,
        } => {
            let root = resolve_projects_root(projects_root)?;
            let report = scan::scan_for_sessions(&root, skip_active_threshold_ms)?;

            for session in &report.discovered {
                println!(
                    "{}  {:>9} bytes  {}",
                    session.session_id,
                    session.file_size_bytes,
                    session.transcript_path.display()
                );
            }
            println!(
                "{} discovered, {} skipped as subagents, {} skipped as active, {} errors",
                report.discovered.len(),
                report.skipped.subagents,
                report.skipped.active,
                report.errors.len()
            );
            for error in &report.errors {
                eprintln!("error: {}", error);
            }
        }

        Command::Run {
            server,
            projects_root,
            device_id,
            skip_active_threshold_ms,
            concurrency,
            throttle_ms,
            poll_interval_ms,
            timeout_ms,
            no_wait,
        } => {
            let root = resolve_projects_root(projects_root)?;
            let report = scan::scan_for_sessions(&root, skip_active_threshold_ms)?;
            println!(
                "{} sessions to backfill ({} subagent files skipped, {} active skipped)",
                report.discovered.len(),
                report.skipped.subagents,
                report.skipped.active
            );
            if report.discovered.is_empty() {
                return Ok(());
            }

            let client = ApiClient::new(&server.server_url, &server.api_key)?;
            let options = ingest::IngestOptions {
                device_id,
                concurrency,
                throttle_ms,
            };
            let total = report.discovered.len();
            let outcome = ingest::ingest_backfill_sessions(
                &client,
                report.discovered,
                &options,
                &|progress| {
                    eprint!("\r{}/{} sessions posted", progress.completed, progress.total);
                },
            )
            .await;
            eprintln!();
            println!(
                "posted {} sessions ({} already known), {} failed",
                outcome.ingested.len(),
                outcome.skipped,
                outcome.failed.len()
            );
            for (session_id, error) in &outcome.failed {
                eprintln!("  {}: {}", session_id, error);
            }
            if outcome.ingested.is_empty() || no_wait {
                return Ok(());
            }

            let aborted = Arc::new(AtomicBool::new(false));
            let abort_flag = Arc::clone(&aborted);
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                abort_flag.store(true, Ordering::SeqCst);
            });

            let wait = wait::wait_for_pipeline_completion(
                &client,
                &outcome.ingested,
                &wait::WaitOptions {
                    poll_interval_ms,
                    timeout_ms,
                },
                &aborted,
            )
            .await?;

            println!(
                "pipeline: {} parsed, {} summarized, {} archived, {} failed, {} pending",
                wait.summary.parsed,
                wait.summary.summarized,
                wait.summary.archived,
                wait.summary.failed,
                wait.summary.pending
            );
            if wait.timed_out {
                bail!("timed out waiting for {} of {} sessions", wait.summary.pending, total);
            }
            if wait.aborted {
                bail!("aborted while {} sessions were still pending", wait.summary.pending);
            }
        }

        Command::Status { server, reference } => {
            let client = ApiClient::new(&server.server_url, &server.api_key)?;
            let known = client.list_session_ids().await?;
            let session_id = match resolve::resolve_reference(&known, &reference) {
                resolve::Resolution::Match(id) => id,
                resolve::Resolution::None => bail!("no session matches '{}'", reference),
                resolve::Resolution::Ambiguous(matches) => {
                    bail!(
                        "ambiguous session reference '{}': {}",
                        reference,
                        matches.join(", ")
                    )
                }
            };

            let statuses = client.status_batch(&[session_id.clone()]).await?;
            match statuses.first() {
                Some(status) => println!(
                    "{}  lifecycle={}  parse_status={}",
                    status.id, status.lifecycle, status.parse_status
                ),
                None => bail!("session '{}' disappeared between listing and status", session_id),
            }
        }
    }

    Ok(())
}

fn resolve_projects_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    let home = dirs::home_dir().context("cannot determine home directory")?;
    Ok(home.join(".claude").join("projects"))
}
