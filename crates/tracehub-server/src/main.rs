use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracehub_parser::ParserConfig;
use tracehub_pipeline::{
    AnthropicModel, BlobStore, OpendalStore, PipelineDeps, PipelineQueue, QueueConfig,
};
use tracehub_store::{find_stuck_sessions, init_schema};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tracehub_server::config::Config;
use tracehub_server::consumer::{self, ConsumerConfig};
use tracehub_server::handlers::HandlerRegistry;
use tracehub_server::routes;
use tracehub_server::state::AppState;
use tracehub_server::stream::EventStream;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;

    let pool = tracehub_store::connect(&config.database_url)
        .await
        .context("database connection failed")?;
    init_schema(&pool).await.context("schema bootstrap failed")?;

    let stream = EventStream::connect(&config.redis_url).await?;
    stream.ensure_group().await?;

    let blobs: Arc<dyn BlobStore> = match &config.s3_bucket {
        Some(bucket) => Arc::new(
            OpendalStore::s3(bucket, &config.s3_region, config.s3_endpoint.as_deref())
                .context("s3 blob store setup failed")?,
        ),
        None => {
            std::fs::create_dir_all(&config.blob_dir)
                .with_context(|| format!("cannot create blob dir {}", config.blob_dir))?;
            Arc::new(OpendalStore::fs(&config.blob_dir).context("fs blob store setup failed")?)
        }
    };

    let queue = Arc::new(PipelineQueue::new(QueueConfig {
        max_concurrent: config.pipeline_concurrency,
        max_depth: config.pipeline_max_depth,
    }));
    let deps = Arc::new(PipelineDeps {
        pool: pool.clone(),
        blobs: Arc::clone(&blobs),
        summary_config: config.summary.clone(),
        summary_model: Arc::new(AnthropicModel::default()),
        parser_config: ParserConfig::default(),
    });
    queue.start(Arc::clone(&deps)).await;

    let state = AppState::new(
        pool.clone(),
        stream.clone(),
        Arc::clone(&queue),
        blobs,
        config.api_key.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // A process restart drops the in-memory queue; this sweep re-enqueues
    // sessions whose parse never finished.
    let sweep = tokio::spawn(stuck_session_sweep(
        state.clone(),
        config.stuck_threshold_ms,
        shutdown_rx.clone(),
    ));

    let consumer_task = tokio::spawn(consumer::run(
        state.clone(),
        HandlerRegistry::new(),
        ConsumerConfig {
            block_ms: config.consumer_block_ms,
            max_deliveries: config.consumer_max_deliveries,
            ..ConsumerConfig::default()
        },
        shutdown_rx,
    ));

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("cannot bind {}", config.bind))?;
    info!(bind = %config.bind, "tracehub-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Shutdown order: listener already stopped accepting; now break the
    // consumer's read loop, then drain the pipeline queue.
    info!("shutting down");
    let _ = shutdown_tx.send(true);
    let _ = consumer_task.await;
    let _ = sweep.await;
    queue.stop().await;
    info!("shutdown complete");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tracehub=debug"));

    if std::env::var("TRACEHUB_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn stuck_session_sweep(
    state: AppState,
    threshold_ms: i64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(300));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        match find_stuck_sessions(&state.pool, threshold_ms).await {
            Ok(stuck) => {
                for session in stuck {
                    info!(session_id = %session.id, "re-enqueueing stuck session");
                    state.queue.enqueue(&session.id);
                }
            }
            Err(e) => warn!(error = %e, "stuck session sweep failed"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
