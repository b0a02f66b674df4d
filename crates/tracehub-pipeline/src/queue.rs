use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::runner::{PipelineDeps, run_session_pipeline};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_concurrent: usize,
    pub max_depth: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            max_depth: 50,
        }
    }
}

/// Bounded, process-local work queue feeding the session pipeline.
///
/// `max_concurrent` worker tasks drain a pending list capped at `max_depth`;
/// overflow is dropped with a warning (a stuck-session sweep reintroduces
/// anything lost). `stop` clears pending work and waits for in-flight runs.
pub struct PipelineQueue {
    inner: Arc<QueueInner>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

struct QueueInner {
    config: QueueConfig,
    pending: std::sync::Mutex<VecDeque<String>>,
    notify: Notify,
    stopped: AtomicBool,
}

impl PipelineQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                config,
                pending: std::sync::Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                stopped: AtomicBool::new(false),
            }),
            workers: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker tasks. Call once at startup.
    pub async fn start(&self, deps: Arc<PipelineDeps>) {
        let mut workers = self.workers.lock().await;
        for worker_id in 0..self.inner.config.max_concurrent {
            let inner = Arc::clone(&self.inner);
            let deps = Arc::clone(&deps);
            workers.push(tokio::spawn(async move {
                worker_loop(worker_id, inner, deps).await;
            }));
        }
    }

    /// Queue a session for post-processing. Dropped with a warning when the
    /// queue is full; a no-op once the queue is stopped.
    pub fn enqueue(&self, session_id: &str) -> bool {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return false;
        }
        let Ok(mut pending) = self.inner.pending.lock() else {
            return false;
        };
        if pending.len() >= self.inner.config.max_depth {
            warn!(
                session_id = %session_id,
                depth = pending.len(),
                "pipeline queue full, dropping enqueue"
            );
            return false;
        }
        pending.push_back(session_id.to_string());
        drop(pending);
        self.inner.notify.notify_one();
        true
    }

    pub fn depth(&self) -> usize {
        self.inner
            .pending
            .lock()
            .map(|pending| pending.len())
            .unwrap_or(0)
    }

    /// Stop accepting work, clear the pending list, and wait for in-flight
    /// runs to finish.
    pub async fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        if let Ok(mut pending) = self.inner.pending.lock() {
            pending.clear();
        }
        self.inner.notify.notify_waiters();

        let mut workers = self.workers.lock().await;
        for worker in workers.drain(..) {
            let _ = worker.await;
        }
    }
}

async fn worker_loop(worker_id: usize, inner: Arc<QueueInner>, deps: Arc<PipelineDeps>) {
    loop {
        // Arm the wakeup before checking state so a notify between the check
        // and the await is not lost.
        let notified = inner.notify.notified();

        if inner.stopped.load(Ordering::SeqCst) {
            break;
        }

        let next = inner
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.pop_front());

        match next {
            Some(session_id) => {
                debug!(worker = worker_id, session_id = %session_id, "pipeline run starting");
                let outcome = run_session_pipeline(&deps, &session_id).await;
                debug!(
                    worker = worker_id,
                    session_id = %session_id,
                    parse_success = outcome.parse_success,
                    "pipeline run finished"
                );
            }
            None => notified.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_depth_cap_drops_overflow() {
        let queue = PipelineQueue::new(QueueConfig {
            max_concurrent: 0,
            max_depth: 50,
        });

        for i in 0..50 {
            assert!(queue.enqueue(&format!("session-{}", i)));
        }
        assert_eq!(queue.depth(), 50);

        // One more is dropped, depth unchanged.
        assert!(!queue.enqueue("session-overflow"));
        assert_eq!(queue.depth(), 50);
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_is_noop() {
        let queue = PipelineQueue::new(QueueConfig {
            max_concurrent: 0,
            max_depth: 10,
        });
        queue.enqueue("before-stop");
        queue.stop().await;

        assert_eq!(queue.depth(), 0, "stop clears pending");
        assert!(!queue.enqueue("after-stop"));
        assert_eq!(queue.depth(), 0);
    }
}
