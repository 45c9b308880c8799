//! # Bounded worker pool.
//!
//! [`WorkerPool`] runs units of work on the tokio runtime, at most `workers`
//! at a time. Pools are created and shut down explicitly by the composition
//! root; nothing in the crate creates one implicitly.
//!
//! ## Lifecycle
//! ```text
//! spawn(fut) ─► tracker.spawn:
//!                 ├─► acquire permit (cancellable by pool shutdown)
//!                 │     ├─ closed / cancelled ─► return None (work never ran)
//!                 │     └─ permit           ─► Some(fut.await)
//!                 └─► permit released on completion
//!
//! shutdown() ─► cancel pool token (running units observe child tokens)
//!            ─► close semaphore (queued units give up)
//!            ─► close tracker (join() can complete)
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::select;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::error::RuntimeError;

struct PoolInner {
    name: Arc<str>,
    workers: usize,
    semaphore: Arc<Semaphore>,
    token: CancellationToken,
    tracker: TaskTracker,
}

/// Cheaply cloneable handle to a bounded pool.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Creates a pool running at most `workers` units at once (min 1).
    pub fn new(name: impl Into<Arc<str>>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                workers,
                semaphore: Arc::new(Semaphore::new(workers)),
                token: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Maximum number of concurrently running units.
    pub fn workers(&self) -> usize {
        self.inner.workers
    }

    /// True once [`shutdown`](Self::shutdown) was called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Number of units queued or running.
    pub fn pending(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Token cancelled when the pool shuts down; hand children of it to work.
    pub fn child_token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    /// Queues `fut` on the pool.
    ///
    /// The returned handle yields `None` if the pool shut down before the unit
    /// obtained a worker.
    pub fn spawn<F>(&self, fut: F) -> Result<JoinHandle<Option<F::Output>>, RuntimeError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.is_shutdown() {
            return Err(RuntimeError::PoolShutdown {
                pool: self.inner.name.to_string(),
            });
        }

        let sem = Arc::clone(&self.inner.semaphore);
        let token = self.inner.token.clone();
        let name = Arc::clone(&self.inner.name);

        Ok(self.inner.tracker.spawn(async move {
            let permit_future = sem.acquire_owned();
            tokio::pin!(permit_future);

            let _permit = select! {
                res = &mut permit_future => match res {
                    Ok(permit) => permit,
                    Err(_closed) => return None,
                },
                _ = token.cancelled() => {
                    debug!(pool = %name, "unit dropped before start");
                    return None;
                }
            };
            Some(fut.await)
        }))
    }

    /// Cancels outstanding work and rejects new work. Does not wait.
    pub fn shutdown(&self) {
        if !self.inner.token.is_cancelled() {
            debug!(pool = %self.inner.name, "shutting down");
        }
        self.inner.token.cancel();
        self.inner.semaphore.close();
        self.inner.tracker.close();
    }

    /// Waits until every unit has finished. Only completes after `shutdown`.
    pub async fn join(&self) {
        self.inner.tracker.wait().await;
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.inner.name)
            .field("workers", &self.inner.workers)
            .field("pending", &self.pending())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn runs_work_and_returns_output() {
        let pool = WorkerPool::new("test", 2);
        let h = pool.spawn(async { 21 * 2 }).unwrap();
        assert_eq!(h.await.unwrap(), Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_worker_count() {
        let pool = WorkerPool::new("bounded", 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(
                pool.spawn(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .unwrap(),
            );
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), Some(()));
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_work() {
        let pool = WorkerPool::new("closing", 1);
        pool.shutdown();
        let err = pool.spawn(async {}).unwrap_err();
        assert_eq!(err, RuntimeError::PoolShutdown { pool: "closing".into() });
        pool.join().await;
        assert!(pool.is_shutdown());
    }

    #[tokio::test(start_paused = true)]
    async fn queued_work_is_dropped_on_shutdown() {
        let pool = WorkerPool::new("busy", 1);
        let token = pool.child_token();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let first = pool
            .spawn(async move {
                let _ = started_tx.send(());
                token.cancelled().await;
                "first"
            })
            .unwrap();
        started_rx.await.unwrap();
        let second = pool.spawn(async { "second" }).unwrap();

        tokio::task::yield_now().await;
        pool.shutdown();
        pool.join().await;

        assert_eq!(first.await.unwrap(), Some("first"));
        assert_eq!(second.await.unwrap(), None);
    }
}
