//! ManagedFuture / TriggerManagedFuture - 呼び出し側に返す future
//!
//! ManagedFuture は listener だけを保持し、handle は毎回 listener から取り直します。
//! TriggerManagedFuture も同じ listener 経由でスケジュール全体の完了判定と
//! skip のエラー変換を行い、RecurringTask 本体からは履歴と状態だけを読みます。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::app::recurring::RecurringTask;
use crate::domain::{ExecutionHistory, ScheduleError, TaskId, TaskState};
use crate::ports::{OccurrenceHandle, TaskListener};

/// Future over whatever occurrence its task currently exposes.
pub struct ManagedFuture<T> {
    listener: Arc<dyn TaskListener<T>>,
}

impl<T> Clone for ManagedFuture<T> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
        }
    }
}

impl<T> fmt::Debug for ManagedFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedFuture")
            .field("task_id", &self.listener.task_id())
            .finish_non_exhaustive()
    }
}

impl<T> ManagedFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(listener: Arc<dyn TaskListener<T>>) -> Self {
        Self { listener }
    }

    pub fn task_id(&self) -> TaskId {
        self.listener.task_id()
    }

    pub fn current_occurrence(&self) -> Option<OccurrenceHandle<T>> {
        self.listener.current()
    }

    /// Wait for the current occurrence.
    pub async fn get(&self) -> Result<T, ScheduleError> {
        match self.listener.current() {
            Some(handle) => handle.wait().await,
            None => Err(self.no_occurrence_error()),
        }
    }

    /// Like `get`, but gives up after `timeout` without cancelling anything.
    pub async fn get_timeout(&self, timeout: Duration) -> Result<T, ScheduleError> {
        match self.listener.current() {
            Some(handle) => handle.wait_timeout(timeout).await,
            None => Err(self.no_occurrence_error()),
        }
    }

    /// The current occurrence has a result. With no occurrence at all, whether the task ended.
    pub fn is_done(&self) -> bool {
        match self.listener.current() {
            Some(handle) => handle.is_done(),
            None => self.listener.is_overall_done(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.listener
            .current()
            .and_then(|handle| handle.outcome())
            .is_some_and(|outcome| matches!(outcome, Err(ScheduleError::Cancelled)))
    }

    /// Cancel the current occurrence. Returns `false` if it already had a result.
    pub fn cancel(&self, interrupt: bool) -> bool {
        self.listener
            .current()
            .is_some_and(|handle| handle.cancel(interrupt))
    }

    fn no_occurrence_error(&self) -> ScheduleError {
        self.listener
            .terminal_error()
            .unwrap_or(ScheduleError::NotScheduled)
    }
}

/// The future returned for a trigger-driven task.
///
/// `get` yields the latest occurrence's value; skipped occurrences surface as
/// [`ScheduleError::Skipped`] and a failed trigger as [`ScheduleError::TriggerFailed`].
pub struct TriggerManagedFuture<T> {
    inner: ManagedFuture<Option<T>>,
    // history and state only
    task: Arc<RecurringTask<T>>,
}

impl<T> Clone for TriggerManagedFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            task: Arc::clone(&self.task),
        }
    }
}

impl<T> fmt::Debug for TriggerManagedFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerManagedFuture")
            .field("task_id", &self.task.id())
            .field("state", &self.task.state())
            .finish_non_exhaustive()
    }
}

impl<T> TriggerManagedFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(task: Arc<RecurringTask<T>>) -> Self {
        let listener: Arc<dyn TaskListener<Option<T>>> = task.clone();
        Self {
            inner: ManagedFuture::new(listener),
            task,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.inner.task_id()
    }

    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    pub fn history(&self) -> ExecutionHistory {
        self.task.history()
    }

    /// Whether the most recently finished occurrence was skipped.
    pub fn is_skipped(&self) -> bool {
        self.listener().is_latest_skipped()
    }

    pub fn current_occurrence(&self) -> Option<OccurrenceHandle<Option<T>>> {
        self.inner.current_occurrence()
    }

    /// The current occurrence is finished and no further one will be created.
    pub fn is_done(&self) -> bool {
        self.inner.is_done() && self.listener().is_overall_done()
    }

    pub fn is_cancelled(&self) -> bool {
        self.listener().is_future_scheduling_cancelled() && self.inner.is_cancelled()
    }

    /// Stop all future scheduling, then cancel the current occurrence.
    ///
    /// Scheduling is stopped first so the task cannot slip in a new occurrence
    /// between the two steps.
    pub fn cancel(&self, interrupt: bool) -> bool {
        self.listener().cancel_future_scheduling();
        self.inner.cancel(interrupt)
    }

    pub async fn get(&self) -> Result<T, ScheduleError> {
        let value = self.inner.get().await?;
        self.resolve(value)
    }

    pub async fn get_timeout(&self, timeout: Duration) -> Result<T, ScheduleError> {
        let value = self.inner.get_timeout(timeout).await?;
        self.resolve(value)
    }

    fn listener(&self) -> &dyn TaskListener<Option<T>> {
        self.inner.listener.as_ref()
    }

    fn resolve(&self, value: Option<T>) -> Result<T, ScheduleError> {
        let listener = self.listener();
        if let Some(err) = listener.terminal_error() {
            return Err(err);
        }
        if listener.is_latest_skipped() {
            return Err(ScheduleError::Skipped);
        }
        value.ok_or(ScheduleError::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::recurring::TaskContext;
    use crate::app::one_shot::OneShotTask;
    use crate::domain::BoxError;
    use crate::impls::{TimetableTrigger, TokioExecutor};
    use crate::ports::{Clock, NoopEventSink, TokioClock, UlidGenerator, Work};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context() -> TaskContext {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        TaskContext {
            executor: Arc::new(TokioExecutor::try_current(2, Arc::clone(&clock)).unwrap()),
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            events: Arc::new(NoopEventSink),
            history_limit: None,
        }
    }

    fn recurring(trigger: TimetableTrigger) -> TriggerManagedFuture<usize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let work: Arc<dyn Work<usize>> = Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move { Ok::<_, BoxError>(counter.fetch_add(1, Ordering::SeqCst) + 1) }
        });
        let task = RecurringTask::new(work, Box::new(trigger), context());
        task.start().unwrap();
        TriggerManagedFuture::new(task)
    }

    #[tokio::test(start_paused = true)]
    async fn managed_future_follows_a_one_shot_task() {
        let ctx = context();
        let work: Arc<dyn Work<u8>> = Arc::new(|| async { Ok::<_, BoxError>(9) });
        let task = OneShotTask::schedule(work, ctx.clock.now(), &ctx).unwrap();
        let future = ManagedFuture::new(task as Arc<dyn TaskListener<u8>>);

        assert_eq!(future.get().await.unwrap(), 9);
        assert!(future.is_done());
        assert!(!future.is_cancelled());
        assert!(!future.cancel(true));
    }

    #[tokio::test(start_paused = true)]
    async fn no_occurrence_means_not_scheduled() {
        let future = recurring(TimetableTrigger::default());

        assert!(future.is_done());
        assert!(matches!(future.get().await, Err(ScheduleError::NotScheduled)));
        assert!(matches!(
            future.get_timeout(Duration::from_secs(1)).await,
            Err(ScheduleError::NotScheduled)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn get_is_idempotent_after_completion() {
        let future = recurring(TimetableTrigger::after([Duration::from_secs(1)]));

        assert_eq!(future.get().await.unwrap(), 1);
        assert_eq!(future.get().await.unwrap(), 1);
        tokio::task::yield_now().await;
        assert!(future.is_done());
        assert_eq!(future.state(), TaskState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_occurrence_fails_get_with_skipped() {
        let future = recurring(TimetableTrigger::after([Duration::from_secs(1)]).skip_occurrence(1));

        assert!(matches!(future.get().await, Err(ScheduleError::Skipped)));
        assert!(future.is_skipped());
        assert_eq!(future.history().counts().skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_pending_occurrence_and_the_schedule() {
        let future = recurring(TimetableTrigger::after([
            Duration::from_secs(10),
            Duration::from_secs(20),
        ]));

        assert!(future.cancel(false));
        assert!(matches!(future.get().await, Err(ScheduleError::Cancelled)));
        assert!(!future.cancel(false));

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(future.is_done());
        assert!(future.is_cancelled());
        assert_eq!(future.history().counts().cancelled, 1);
        assert_eq!(future.history().counts().completed, 0);
    }
}
