//! Executor port - 遅延実行の抽象化（underlying scheduler）
//!
//! Executor は「時刻 at 以降に job を 1 回実行する」だけを担当します。
//! occurrence 単位の結果の受け渡しとキャンセルは `OccurrenceHandle` が担当し、
//! 繰り返しの判断は RecurringTask が担当します。

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::domain::{OccurrenceId, ScheduleError};

/// Type-erased unit of work handed to an executor.
pub type Job = BoxFuture<'static, ()>;

/// Control over one scheduled job.
pub trait JobControl: Send + Sync {
    /// Stop the job. A pending job never starts; a running one is dropped at its next
    /// suspension point.
    fn abort(&self);
}

/// Returned when an executor refuses a job. The job is handed back untouched.
pub struct Rejected {
    pub reason: String,
    pub job: Job,
}

impl std::fmt::Debug for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// Executor runs a job at (or after) a wall-clock time on a bounded worker pool.
pub trait Executor: Send + Sync {
    fn schedule_at(&self, at: DateTime<Utc>, job: Job) -> Result<Arc<dyn JobControl>, Rejected>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn schedule_at(&self, at: DateTime<Utc>, job: Job) -> Result<Arc<dyn JobControl>, Rejected> {
        self.as_ref().schedule_at(at, job)
    }
}

type Slot<T> = Option<Result<T, ScheduleError>>;

struct Shared<T> {
    result: watch::Sender<Slot<T>>,
    started: AtomicBool,
    armed: AtomicBool,
    control: OnceLock<Arc<dyn JobControl>>,
}

impl<T> Shared<T> {
    /// First writer wins; returns whether this call delivered the result.
    fn complete(&self, result: Result<T, ScheduleError>) -> bool {
        let mut result = Some(result);
        self.result.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = result.take();
            true
        })
    }

    fn is_done(&self) -> bool {
        self.result.borrow().is_some()
    }
}

/// The future of one occurrence.
///
/// Cheap to clone; every clone observes the same result. The result is delivered
/// exactly once, whether by the work finishing or by `cancel`.
pub struct OccurrenceHandle<T> {
    id: OccurrenceId,
    scheduled_at: DateTime<Utc>,
    shared: Arc<Shared<T>>,
}

impl<T> Clone for OccurrenceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            scheduled_at: self.scheduled_at,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for OccurrenceHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OccurrenceHandle")
            .field("id", &self.id)
            .field("scheduled_at", &self.scheduled_at)
            .field("done", &self.shared.is_done())
            .finish()
    }
}

impl<T: Clone> OccurrenceHandle<T> {
    /// Wait for the occurrence to finish. Repeated calls return the same result.
    pub async fn wait(&self) -> Result<T, ScheduleError> {
        let mut rx = self.shared.result.subscribe();
        let slot = rx.wait_for(Option::is_some).await;
        match slot {
            Ok(slot) => match &*slot {
                Some(result) => result.clone(),
                None => Err(ScheduleError::Cancelled),
            },
            Err(_) => Err(ScheduleError::Cancelled),
        }
    }

    /// Like `wait`, but gives up after `timeout`. Giving up cancels nothing.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<T, ScheduleError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ScheduleError::Timeout(timeout))?
    }

    /// The result, if the occurrence has finished.
    pub fn outcome(&self) -> Option<Result<T, ScheduleError>> {
        (*self.shared.result.borrow()).clone()
    }
}

impl<T> OccurrenceHandle<T> {
    pub fn id(&self) -> OccurrenceId {
        self.id
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    /// True once the occurrence finished or was cancelled.
    pub fn is_done(&self) -> bool {
        self.shared.is_done()
    }

    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::SeqCst)
    }

    /// Settle the result from inside the occurrence's own work, so the caller can
    /// act on who won the slot. Returns `false` if a cancel got there first.
    pub(crate) fn deliver(&self, result: Result<T, ScheduleError>) -> bool {
        self.shared.complete(result)
    }

    /// Cancel this occurrence.
    ///
    /// Returns `false` when the result was already delivered. A pending occurrence
    /// never starts; a running one is interrupted only when `interrupt` is set,
    /// otherwise it runs on and its result is discarded.
    pub fn cancel(&self, interrupt: bool) -> bool {
        let cancelled = self.shared.complete(Err(ScheduleError::Cancelled));
        if cancelled && (interrupt || !self.is_started()) {
            if let Some(control) = self.shared.control.get() {
                control.abort();
            }
        }
        cancelled
    }
}

/// How an occurrence's job went away. Passed to the completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobExit {
    /// The job was polled: it ran its work, or found itself cancelled and stopped.
    Ran,
    /// Cancelled through its handle before it was ever polled.
    Cancelled,
    /// Dropped unpolled by the executor (shutdown, or its runtime went away).
    Abandoned,
}

/// Runs the completion callback exactly once, whenever the job future goes away
/// (finished, aborted, or dropped by a shutting-down executor).
struct FinishGuard<T, C: FnOnce(JobExit)> {
    shared: Arc<Shared<T>>,
    on_finished: Option<C>,
}

impl<T, C: FnOnce(JobExit)> Drop for FinishGuard<T, C> {
    fn drop(&mut self) {
        if !self.shared.armed.load(Ordering::SeqCst) {
            return;
        }
        let settled_here = self.shared.complete(Err(ScheduleError::Cancelled));
        let exit = if self.shared.started.load(Ordering::SeqCst) {
            JobExit::Ran
        } else if settled_here {
            JobExit::Abandoned
        } else {
            JobExit::Cancelled
        };
        if let Some(callback) = self.on_finished.take() {
            callback(exit);
        }
    }
}

/// An occurrence whose handle exists but whose job is not yet on an executor.
///
/// Lets the caller publish the handle first and submit without holding its own locks.
pub struct PendingOccurrence<T> {
    handle: OccurrenceHandle<T>,
    job: Job,
}

impl<T> PendingOccurrence<T> {
    pub fn handle(&self) -> &OccurrenceHandle<T> {
        &self.handle
    }

    /// Hand the job to `executor`.
    ///
    /// On rejection the callback is disarmed and the handle settles as
    /// `ScheduleError::Rejected`, so anyone already waiting on it wakes up.
    pub fn submit(self, executor: &dyn Executor) -> Result<OccurrenceHandle<T>, ScheduleError> {
        let Self { handle, job } = self;
        match executor.schedule_at(handle.scheduled_at, job) {
            Ok(control) => {
                // set() only fails if already set, which cannot happen for a fresh handle
                let _ = handle.shared.control.set(Arc::clone(&control));
                // a cancel that landed before the control was set could not abort the wait
                if handle.is_done() && !handle.is_started() {
                    control.abort();
                }
                Ok(handle)
            }
            Err(Rejected { reason, job }) => {
                handle.shared.armed.store(false, Ordering::SeqCst);
                drop(job);
                handle
                    .shared
                    .complete(Err(ScheduleError::Rejected(reason.clone())));
                Err(ScheduleError::Rejected(reason))
            }
        }
    }
}

/// Build the handle and job of one occurrence without submitting it.
///
/// `on_finished` runs once after the handle's result is settled, including when the
/// occurrence was cancelled before it started, interrupted mid-run, or dropped by the
/// executor. It does not run when the executor rejects the job.
pub fn prepare_occurrence<T, F, C>(id: OccurrenceId, at: DateTime<Utc>, work: F, on_finished: C) -> PendingOccurrence<T>
where
    T: Send + Sync + 'static,
    F: Future<Output = Result<T, ScheduleError>> + Send + 'static,
    C: FnOnce(JobExit) + Send + 'static,
{
    let (tx, _) = watch::channel(None);
    let shared = Arc::new(Shared {
        result: tx,
        started: AtomicBool::new(false),
        armed: AtomicBool::new(true),
        control: OnceLock::new(),
    });

    let guard = FinishGuard {
        shared: Arc::clone(&shared),
        on_finished: Some(on_finished),
    };
    let job_shared = Arc::clone(&shared);
    let job: Job = Box::pin(async move {
        let _guard = guard;
        // started before the check, so a concurrent cancel either sees it or wins the slot
        job_shared.started.store(true, Ordering::SeqCst);
        if job_shared.is_done() {
            return;
        }
        let result = AssertUnwindSafe(work)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ScheduleError::from_panic(panic)));
        job_shared.complete(result);
    });

    PendingOccurrence {
        handle: OccurrenceHandle {
            id,
            scheduled_at: at,
            shared,
        },
        job,
    }
}

/// Schedule `work` as one occurrence on `executor` and return its handle.
pub fn schedule_occurrence<T, F, C>(
    executor: &dyn Executor,
    id: OccurrenceId,
    at: DateTime<Utc>,
    work: F,
    on_finished: C,
) -> Result<OccurrenceHandle<T>, ScheduleError>
where
    T: Send + Sync + 'static,
    F: Future<Output = Result<T, ScheduleError>> + Send + 'static,
    C: FnOnce(JobExit) + Send + 'static,
{
    prepare_occurrence(id, at, work, on_finished).submit(executor)
}
