//! TokioExecutor - tokio ベースの遅延実行
//!
//! # 実装詳細
//! - タイマー: job ごとに spawn したタスク内で `sleep_until`
//! - worker pool: `Semaphore`（pool_size 個の permit）で同時実行数を制限
//! - shutdown: `CancellationToken` で待機中の job を破棄し、新規投入を拒否
//!
//! 実行中の job は shutdown で中断しません（`shutdown_and_wait` で待てる）。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::ports::clock::deadline_for;
use crate::ports::{Clock, Executor, Job, JobControl, Rejected};

/// Bounded-pool executor on a tokio runtime.
pub struct TokioExecutor {
    runtime: Handle,
    clock: Arc<dyn Clock>,
    permits: Arc<Semaphore>,
    pool_size: usize,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl TokioExecutor {
    /// Create an executor on an explicit runtime handle.
    pub fn new(runtime: Handle, pool_size: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            runtime,
            clock,
            permits: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Create an executor on the runtime of the calling context, if there is one.
    pub fn try_current(pool_size: usize, clock: Arc<dyn Clock>) -> Option<Self> {
        Handle::try_current()
            .ok()
            .map(|runtime| Self::new(runtime, pool_size, clock))
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop accepting jobs and drop every job still waiting for its time or a worker.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!(pending = self.tracker.len(), "Shutting down executor");
        self.shutdown.cancel();
        self.tracker.close();
    }

    /// `shutdown`, then wait up to `grace` for running jobs. Returns whether they all ended.
    pub async fn shutdown_and_wait(&self, grace: Duration) -> bool {
        self.shutdown();
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    still_running = self.tracker.len(),
                    "Executor jobs did not finish within {:?}", grace
                );
                false
            }
        }
    }
}

impl Drop for TokioExecutor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct TokioJob(AbortHandle);

impl JobControl for TokioJob {
    fn abort(&self) {
        self.0.abort();
    }
}

impl Executor for TokioExecutor {
    fn schedule_at(&self, at: DateTime<Utc>, job: Job) -> Result<Arc<dyn JobControl>, Rejected> {
        if self.shutdown.is_cancelled() {
            return Err(Rejected {
                reason: "executor is shut down".to_string(),
                job,
            });
        }

        let deadline = deadline_for(self.clock.as_ref(), at);
        let permits = Arc::clone(&self.permits);
        let shutdown = self.shutdown.clone();

        let handle = self.runtime.spawn(self.tracker.track_future(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(%at, "Dropping pending job on shutdown");
                    return;
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }

            let _permit = tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(%at, "Dropping job waiting for a worker on shutdown");
                    return;
                }
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            job.await;
        }));

        Ok(Arc::new(TokioJob(handle.abort_handle())))
    }
}
