//! RecurringTask - trigger 駆動の繰り返しタスク
//!
//! # 状態遷移
//! - Idle -> Scheduled -> Running -> Completed | Failed -> Scheduled | Done
//! - Scheduled -> Skipped -> Scheduled | Done
//!
//! # 実行の流れ
//! 1. `start`: trigger に初回時刻を問い合わせ、occurrence 1 を executor に投入
//! 2. `on_occurrence_due`: skip 判定 → work 実行 → handle の確定と history への記録（同一ロック内）
//! 3. `after_occurrence_finished`: 次回時刻を計算し、current を差し替えてからロックの外で executor に投入
//!
//! occurrence N+1 は occurrence N の完了後にしか作られないため、実行が重なることはありません。
//! executor が job を一度も poll せずに捨てた場合（shutdown や runtime の終了）は
//! 再投入せず `DoneReason::Rejected` で終了します。
//! EventSink はユーザーコードなので、イベントはロックを外してから送ります。

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::domain::errors::panic_message;
use crate::domain::{
    BoxError, DoneReason, ExecutionHistory, OccurrenceId, OccurrenceRecord, OccurrenceState,
    ScheduleError, SchedulerEvent, TaskId, TaskState,
};
use crate::ports::{
    Clock, EventSink, Executor, IdGenerator, JobExit, OccurrenceHandle, PendingOccurrence,
    TaskListener, Trigger, TriggerContext, Work, prepare_occurrence,
};

/// Collaborators a task needs from its scheduler.
#[derive(Clone)]
pub struct TaskContext {
    pub executor: Arc<dyn Executor>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub events: Arc<dyn EventSink>,
    pub history_limit: Option<usize>,
}

struct Current<T> {
    handle: OccurrenceHandle<Option<T>>,
    sequence: u64,
    started_at: Option<DateTime<Utc>>,
    /// The outcome is already in the history.
    recorded: bool,
}

struct Inner<T> {
    state: TaskState,
    history: ExecutionHistory,
    current: Option<Current<T>>,
    latest_skipped: bool,
    terminal_error: Option<ScheduleError>,
}

/// An occurrence installed as current but not yet handed to the executor.
struct NextOccurrence<T> {
    pending: PendingOccurrence<Option<T>>,
    previous: Option<Current<T>>,
}

enum Begin<T> {
    Run(u64),
    Settled(Result<Option<T>, ScheduleError>),
}

/// A unit of work re-run at the times its trigger computes.
///
/// Always handled through `Arc`; every occurrence holds a reference back to its task.
pub struct RecurringTask<T> {
    id: TaskId,
    work: Arc<dyn Work<T>>,
    trigger: Box<dyn Trigger>,
    ctx: TaskContext,
    scheduling_cancelled: AtomicBool,
    overall_done: AtomicBool,
    inner: Mutex<Inner<T>>,
}

impl<T> RecurringTask<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(work: Arc<dyn Work<T>>, trigger: Box<dyn Trigger>, ctx: TaskContext) -> Arc<Self> {
        let id = ctx.ids.generate_task_id();
        let history = ExecutionHistory::new(ctx.clock.now(), ctx.history_limit);
        Arc::new(Self {
            id,
            work,
            trigger,
            ctx,
            scheduling_cancelled: AtomicBool::new(false),
            overall_done: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                state: TaskState::Idle,
                history,
                current: None,
                latest_skipped: false,
                terminal_error: None,
            }),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Compute the first run time and schedule occurrence 1.
    ///
    /// A trigger that yields nothing (or fails) ends the task here; that is not an error
    /// for the caller, it surfaces at retrieval. Only executor rejection is returned.
    pub fn start(self: &Arc<Self>) -> Result<(), ScheduleError> {
        let mut events = Vec::new();
        let next = {
            let mut inner = self.lock();
            if inner.state != TaskState::Idle {
                return Ok(());
            }

            let now = self.ctx.clock.now();
            match self.next_run_time(&inner.history, now) {
                Ok(Some(at)) => Some(self.install_next(&mut inner, at, &mut events)),
                Ok(None) => {
                    info!(task_id = %self.id, "Trigger produced no first occurrence");
                    self.finish(&mut inner, DoneReason::Exhausted, &mut events);
                    None
                }
                Err(err) => {
                    warn!(task_id = %self.id, error = %err, "Trigger failed computing the first occurrence");
                    inner.terminal_error = Some(ScheduleError::trigger_failed(err));
                    self.finish(&mut inner, DoneReason::TriggerFailed, &mut events);
                    None
                }
            }
        };
        self.emit_all(events);

        match next {
            Some(next) => self.submit(next),
            None => Ok(()),
        }
    }

    /// Stop creating occurrences. Idempotent; the current occurrence is left alone.
    pub fn cancel_scheduling(&self) {
        if self.scheduling_cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(task_id = %self.id, "Scheduling cancelled");
        let mut events = vec![SchedulerEvent::SchedulingCancelled { task_id: self.id }];
        {
            let mut inner = self.lock();
            // with no occurrence left to finish, nothing else would ever mark the task done
            if inner.current.is_none() && !self.is_done() {
                self.finish(&mut inner, DoneReason::Cancelled, &mut events);
            }
        }
        self.emit_all(events);
    }

    pub fn is_scheduling_cancelled(&self) -> bool {
        self.scheduling_cancelled.load(Ordering::SeqCst)
    }

    /// No occurrence will ever be created again.
    pub fn is_done(&self) -> bool {
        self.overall_done.load(Ordering::SeqCst)
    }

    /// Whether the most recently finished occurrence was skipped.
    pub fn is_skipped(&self) -> bool {
        self.lock().latest_skipped
    }

    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    pub fn history(&self) -> ExecutionHistory {
        self.lock().history.clone()
    }

    pub fn terminal_error(&self) -> Option<ScheduleError> {
        self.lock().terminal_error.clone()
    }

    pub fn current_occurrence(&self) -> Option<OccurrenceHandle<Option<T>>> {
        self.lock().current.as_ref().map(|c| c.handle.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sinks are user code; never call them with the lock held.
    fn emit_all(&self, events: Vec<SchedulerEvent>) {
        for event in events {
            self.ctx.events.emit(event);
        }
    }

    fn next_run_time(
        &self,
        history: &ExecutionHistory,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, BoxError> {
        let ctx = TriggerContext::new(history, now);
        std::panic::catch_unwind(AssertUnwindSafe(|| self.trigger.next_run_time(&ctx)))
            .unwrap_or_else(|panic| Err(panic_message(panic).into()))
    }

    fn skip_run(
        &self,
        history: &ExecutionHistory,
        now: DateTime<Utc>,
        scheduled_at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        let ctx = TriggerContext::new(history, now);
        std::panic::catch_unwind(AssertUnwindSafe(|| self.trigger.skip_run(&ctx, scheduled_at)))
            .unwrap_or_else(|panic| Err(panic_message(panic).into()))
    }

    /// Build the next occurrence and make it current. Caller holds the lock; the
    /// occurrence is not on the executor until [`Self::submit`].
    fn install_next(
        self: &Arc<Self>,
        inner: &mut Inner<T>,
        at: DateTime<Utc>,
        events: &mut Vec<SchedulerEvent>,
    ) -> NextOccurrence<T> {
        let sequence = inner.history.next_sequence();
        let occurrence_id = self.ctx.ids.generate_occurrence_id();

        let due = Arc::clone(self);
        let work = async move { due.on_occurrence_due(occurrence_id, at).await };
        let finished = Arc::clone(self);
        let on_finished = move |exit: JobExit| finished.after_occurrence_finished(occurrence_id, exit);
        let pending = prepare_occurrence(occurrence_id, at, work, on_finished);

        let previous = inner.current.replace(Current {
            handle: pending.handle().clone(),
            sequence,
            started_at: None,
            recorded: false,
        });
        inner.state = TaskState::Scheduled;
        debug!(task_id = %self.id, occurrence = %occurrence_id, sequence, scheduled_at = %at, "Occurrence scheduled");
        events.push(SchedulerEvent::OccurrenceScheduled {
            task_id: self.id,
            occurrence_id,
            sequence,
            scheduled_at: at,
        });
        NextOccurrence { pending, previous }
    }

    /// Hand an installed occurrence to the executor. Must be called without the lock:
    /// an executor that cannot run the job drops it inline, which re-enters the task.
    fn submit(self: &Arc<Self>, next: NextOccurrence<T>) -> Result<(), ScheduleError> {
        let NextOccurrence { pending, previous } = next;
        let occurrence_id = pending.handle().id();
        match pending.submit(self.ctx.executor.as_ref()) {
            Ok(handle) => {
                // cancel_scheduling may have run while the new handle was being published
                if self.is_scheduling_cancelled() {
                    handle.cancel(false);
                }
                Ok(())
            }
            Err(err) => {
                let mut events = Vec::new();
                {
                    let mut inner = self.lock();
                    // the rejected occurrence never existed; retrieval keeps the last real one
                    if inner.current.as_ref().is_some_and(|c| c.handle.id() == occurrence_id) {
                        inner.current = previous;
                    }
                    self.finish(&mut inner, DoneReason::Rejected, &mut events);
                }
                self.emit_all(events);
                Err(err)
            }
        }
    }

    /// The body of one occurrence. Its outcome is recorded in the same critical
    /// section that settles the occurrence handle.
    async fn on_occurrence_due(
        self: Arc<Self>,
        occurrence_id: OccurrenceId,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Option<T>, ScheduleError> {
        let mut events = Vec::new();
        let begin = self.begin_occurrence(occurrence_id, scheduled_at, &mut events);
        self.emit_all(events);
        let sequence = match begin {
            Begin::Run(sequence) => sequence,
            Begin::Settled(result) => return result,
        };

        debug!(task_id = %self.id, occurrence = %occurrence_id, sequence, "Running occurrence");
        let result = match AssertUnwindSafe(self.work.run()).catch_unwind().await {
            Ok(Ok(value)) => Ok(Some(value)),
            Ok(Err(err)) => Err(ScheduleError::work_failed(err)),
            Err(panic) => Err(ScheduleError::from_panic(panic)),
        };
        if let Err(err) = &result {
            warn!(task_id = %self.id, occurrence = %occurrence_id, sequence, error = %err, "Occurrence failed");
        }

        let mut events = Vec::new();
        self.record_outcome(occurrence_id, sequence, scheduled_at, &result, &mut events);
        self.emit_all(events);
        result
    }

    /// Skip decision. Either the work should run, or the occurrence is already settled.
    fn begin_occurrence(
        &self,
        occurrence_id: OccurrenceId,
        scheduled_at: DateTime<Utc>,
        events: &mut Vec<SchedulerEvent>,
    ) -> Begin<T> {
        let mut inner = self.lock();
        let now = self.ctx.clock.now();
        let skip = self.skip_run(&inner.history, now, scheduled_at);
        let Inner {
            state,
            history,
            current,
            latest_skipped,
            terminal_error,
        } = &mut *inner;
        let Some(current) = current.as_mut().filter(|c| c.handle.id() == occurrence_id) else {
            return Begin::Settled(Err(ScheduleError::Cancelled));
        };
        // cancelled between the job's own check and here; the finish callback records it
        if current.handle.is_done() {
            return Begin::Settled(Err(ScheduleError::Cancelled));
        }
        let sequence = current.sequence;

        match skip {
            Ok(true) => {
                if current.handle.deliver(Ok(None)) {
                    info!(task_id = %self.id, occurrence = %occurrence_id, sequence, "Occurrence skipped by trigger");
                    history.push(OccurrenceRecord::skipped(occurrence_id, sequence, scheduled_at, now));
                    current.recorded = true;
                    *latest_skipped = true;
                    *state = TaskState::Skipped;
                    events.push(SchedulerEvent::OccurrenceSkipped {
                        task_id: self.id,
                        occurrence_id,
                        sequence,
                    });
                }
                Begin::Settled(Ok(None))
            }
            Ok(false) => {
                current.started_at = Some(now);
                *state = TaskState::Running;
                events.push(SchedulerEvent::OccurrenceStarted {
                    task_id: self.id,
                    occurrence_id,
                    sequence,
                });
                Begin::Run(sequence)
            }
            Err(err) => {
                warn!(task_id = %self.id, occurrence = %occurrence_id, error = %err, "Trigger failed deciding skip");
                let err = ScheduleError::trigger_failed(err);
                *terminal_error = Some(err.clone());
                if current.handle.deliver(Err(err.clone())) {
                    let record = OccurrenceRecord {
                        id: occurrence_id,
                        sequence,
                        scheduled_at,
                        started_at: None,
                        finished_at: now,
                        state: OccurrenceState::Failed,
                        error: Some(err.to_string()),
                    };
                    events.push(occurrence_event(self.id, &record));
                    history.push(record);
                    current.recorded = true;
                    *latest_skipped = false;
                    *state = TaskState::Failed;
                }
                Begin::Settled(Err(err))
            }
        }
    }

    fn record_outcome(
        &self,
        occurrence_id: OccurrenceId,
        sequence: u64,
        scheduled_at: DateTime<Utc>,
        result: &Result<Option<T>, ScheduleError>,
        events: &mut Vec<SchedulerEvent>,
    ) {
        let mut inner = self.lock();
        let finished_at = self.ctx.clock.now();
        let Inner {
            state,
            history,
            current,
            latest_skipped,
            ..
        } = &mut *inner;
        let Some(current) = current.as_mut().filter(|c| c.handle.id() == occurrence_id) else {
            return;
        };
        let started_at = current.started_at.unwrap_or(finished_at);
        // whoever settled the handle decides the record; cancel(false) lets the work
        // finish, but then the occurrence still counts as cancelled
        let record = if current.handle.deliver(result.clone()) {
            match result {
                Ok(_) => OccurrenceRecord::completed(occurrence_id, sequence, scheduled_at, started_at, finished_at),
                Err(err) => OccurrenceRecord::failed(
                    occurrence_id,
                    sequence,
                    scheduled_at,
                    started_at,
                    finished_at,
                    err.to_string(),
                ),
            }
        } else {
            OccurrenceRecord::cancelled(occurrence_id, sequence, scheduled_at, Some(started_at), finished_at)
        };
        *state = match record.state {
            OccurrenceState::Completed => TaskState::Completed,
            _ => TaskState::Failed,
        };
        events.push(occurrence_event(self.id, &record));
        history.push(record);
        current.recorded = true;
        *latest_skipped = false;
    }

    /// Runs once per occurrence, after its handle is settled. Decides whether the
    /// schedule continues.
    fn after_occurrence_finished(self: &Arc<Self>, occurrence_id: OccurrenceId, exit: JobExit) {
        let mut events = Vec::new();
        let next = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let now = self.ctx.clock.now();

            let Some(current) = inner.current.as_mut().filter(|c| c.handle.id() == occurrence_id) else {
                return;
            };
            if !current.recorded {
                // cancelled before it started, interrupted mid-run, or dropped by the executor
                let record = OccurrenceRecord::cancelled(
                    occurrence_id,
                    current.sequence,
                    current.handle.scheduled_at(),
                    current.started_at,
                    now,
                );
                current.recorded = true;
                debug!(task_id = %self.id, occurrence = %occurrence_id, ?exit, "Occurrence cancelled");
                events.push(occurrence_event(self.id, &record));
                inner.history.push(record);
                inner.latest_skipped = false;
                inner.state = TaskState::Failed;
            }

            if self.is_done() {
                None
            } else if exit == JobExit::Abandoned {
                // the executor is gone; submitting again would only be dropped again
                warn!(task_id = %self.id, occurrence = %occurrence_id, "Occurrence dropped by the executor");
                self.finish(inner, DoneReason::Rejected, &mut events);
                None
            } else if self.is_scheduling_cancelled() {
                self.finish(inner, DoneReason::Cancelled, &mut events);
                None
            } else if inner.terminal_error.is_some() {
                self.finish(inner, DoneReason::TriggerFailed, &mut events);
                None
            } else {
                match self.next_run_time(&inner.history, now) {
                    Ok(Some(at)) => Some(self.install_next(inner, at, &mut events)),
                    Ok(None) => {
                        self.finish(inner, DoneReason::Exhausted, &mut events);
                        None
                    }
                    Err(err) => {
                        warn!(task_id = %self.id, error = %err, "Trigger failed computing the next occurrence");
                        inner.terminal_error = Some(ScheduleError::trigger_failed(err));
                        self.finish(inner, DoneReason::TriggerFailed, &mut events);
                        None
                    }
                }
            }
        };
        self.emit_all(events);

        if let Some(next) = next {
            if let Err(err) = self.submit(next) {
                warn!(task_id = %self.id, error = %err, "Next occurrence was rejected");
            }
        }
    }

    fn finish(&self, inner: &mut Inner<T>, reason: DoneReason, events: &mut Vec<SchedulerEvent>) {
        if self.overall_done.swap(true, Ordering::SeqCst) {
            return;
        }
        inner.state = TaskState::Done;
        info!(
            task_id = %self.id,
            reason = ?reason,
            occurrences = inner.history.counts().total,
            "Task done"
        );
        events.push(SchedulerEvent::TaskDone {
            task_id: self.id,
            reason,
        });
    }
}

fn occurrence_event(task_id: TaskId, record: &OccurrenceRecord) -> SchedulerEvent {
    let occurrence_id = record.id;
    let sequence = record.sequence;
    match record.state {
        OccurrenceState::Completed => SchedulerEvent::OccurrenceCompleted {
            task_id,
            occurrence_id,
            sequence,
        },
        OccurrenceState::Skipped => SchedulerEvent::OccurrenceSkipped {
            task_id,
            occurrence_id,
            sequence,
        },
        OccurrenceState::Failed => SchedulerEvent::OccurrenceFailed {
            task_id,
            occurrence_id,
            sequence,
            error: record.error.clone().unwrap_or_default(),
        },
        OccurrenceState::Pending | OccurrenceState::Running | OccurrenceState::Cancelled => {
            SchedulerEvent::OccurrenceCancelled {
                task_id,
                occurrence_id,
                sequence,
            }
        }
    }
}

impl<T> TaskListener<Option<T>> for RecurringTask<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn task_id(&self) -> TaskId {
        self.id
    }

    fn current(&self) -> Option<OccurrenceHandle<Option<T>>> {
        self.current_occurrence()
    }

    fn is_overall_done(&self) -> bool {
        self.is_done()
    }

    fn is_latest_skipped(&self) -> bool {
        self.is_skipped()
    }

    fn cancel_future_scheduling(&self) {
        self.cancel_scheduling();
    }

    fn is_future_scheduling_cancelled(&self) -> bool {
        self.is_scheduling_cancelled()
    }

    fn terminal_error(&self) -> Option<ScheduleError> {
        RecurringTask::terminal_error(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{ChannelEventSink, TimetableTrigger, TokioExecutor};
    use crate::ports::{Job, JobControl, NoopEventSink, Rejected, TokioClock, UlidGenerator};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn context(events: Arc<dyn EventSink>) -> TaskContext {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let executor = TokioExecutor::try_current(2, Arc::clone(&clock)).unwrap();
        TaskContext {
            executor: Arc::new(executor),
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            events,
            history_limit: None,
        }
    }

    fn counting_work(counter: Arc<AtomicUsize>) -> Arc<dyn Work<usize>> {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move { Ok::<_, BoxError>(counter.fetch_add(1, Ordering::SeqCst) + 1) }
        })
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    struct FailingTrigger;

    impl Trigger for FailingTrigger {
        fn next_run_time(&self, _ctx: &TriggerContext<'_>) -> Result<Option<DateTime<Utc>>, BoxError> {
            Err("no calendar".into())
        }
    }

    struct PanickingSkip;

    impl Trigger for PanickingSkip {
        fn next_run_time(&self, ctx: &TriggerContext<'_>) -> Result<Option<DateTime<Utc>>, BoxError> {
            Ok(ctx.history.is_empty().then_some(ctx.now))
        }

        fn skip_run(&self, _ctx: &TriggerContext<'_>, _at: DateTime<Utc>) -> Result<bool, BoxError> {
            panic!("skip policy exploded")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_every_timetable_entry_then_finishes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task = RecurringTask::new(
            counting_work(Arc::clone(&counter)),
            Box::new(TimetableTrigger::after([
                Duration::from_secs(0),
                Duration::from_secs(5),
                Duration::from_secs(10),
            ])),
            context(Arc::new(NoopEventSink)),
        );
        task.start().unwrap();
        assert_eq!(task.state(), TaskState::Scheduled);

        tokio::time::sleep(Duration::from_secs(11)).await;
        settle().await;

        assert!(task.is_done());
        assert_eq!(task.state(), TaskState::Done);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        let history = task.history();
        assert_eq!(history.counts().completed, 3);
        let sequences: Vec<u64> = history.records().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_trigger_is_done_at_start() {
        let task = RecurringTask::new(
            counting_work(Arc::new(AtomicUsize::new(0))),
            Box::new(TimetableTrigger::default()),
            context(Arc::new(NoopEventSink)),
        );
        task.start().unwrap();

        assert!(task.is_done());
        assert!(task.current_occurrence().is_none());
        assert!(RecurringTask::terminal_error(&task).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_trigger_at_start_is_terminal() {
        let task = RecurringTask::new(
            counting_work(Arc::new(AtomicUsize::new(0))),
            Box::new(FailingTrigger),
            context(Arc::new(NoopEventSink)),
        );
        task.start().unwrap();

        assert!(task.is_done());
        assert!(matches!(
            RecurringTask::terminal_error(&task),
            Some(ScheduleError::TriggerFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_skip_policy_ends_the_task() {
        let task = RecurringTask::new(
            counting_work(Arc::new(AtomicUsize::new(0))),
            Box::new(PanickingSkip),
            context(Arc::new(NoopEventSink)),
        );
        task.start().unwrap();
        let handle = task.current_occurrence().unwrap();

        let err = handle.wait().await.unwrap_err();
        assert!(err.to_string().contains("skip policy exploded"));
        settle().await;
        assert!(task.is_done());
        assert_eq!(task.history().counts().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_scheduling_lets_the_pending_occurrence_finish() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task = RecurringTask::new(
            counting_work(Arc::clone(&counter)),
            Box::new(TimetableTrigger::after([Duration::from_secs(5), Duration::from_secs(10)])),
            context(Arc::new(NoopEventSink)),
        );
        task.start().unwrap();

        task.cancel_scheduling();
        task.cancel_scheduling();
        assert!(task.is_scheduling_cancelled());
        assert!(!task.is_done());

        tokio::time::sleep(Duration::from_secs(20)).await;
        settle().await;
        assert!(task.is_done());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    /// Accepts the first `accept` jobs, then refuses everything.
    struct ClosingExecutor {
        inner: TokioExecutor,
        accept: AtomicUsize,
    }

    impl Executor for ClosingExecutor {
        fn schedule_at(&self, at: DateTime<Utc>, job: Job) -> Result<Arc<dyn JobControl>, Rejected> {
            let left = self.accept.load(Ordering::SeqCst);
            if left == 0 {
                return Err(Rejected {
                    reason: "closed".to_string(),
                    job,
                });
            }
            self.accept.store(left - 1, Ordering::SeqCst);
            self.inner.schedule_at(at, job)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_next_occurrence_keeps_the_last_outcome() {
        let mut ctx = context(Arc::new(NoopEventSink));
        let clock = Arc::clone(&ctx.clock);
        ctx.executor = Arc::new(ClosingExecutor {
            inner: TokioExecutor::try_current(1, clock).unwrap(),
            accept: AtomicUsize::new(1),
        });
        let task = RecurringTask::new(
            counting_work(Arc::new(AtomicUsize::new(0))),
            Box::new(TimetableTrigger::after([Duration::from_secs(1), Duration::from_secs(2)])),
            ctx,
        );
        task.start().unwrap();
        let first = task.current_occurrence().unwrap();
        assert_eq!(first.wait().await.unwrap(), Some(1));
        settle().await;

        assert!(task.is_done());
        let current = task.current_occurrence().unwrap();
        assert_eq!(current.id(), first.id());
        assert_eq!(task.history().counts().total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn events_follow_the_lifecycle() {
        let (sink, mut rx) = ChannelEventSink::new();
        let task = RecurringTask::new(
            counting_work(Arc::new(AtomicUsize::new(0))),
            Box::new(TimetableTrigger::after([Duration::from_secs(1), Duration::from_secs(2)]).skip_occurrence(2)),
            context(Arc::new(sink)),
        );
        task.start().unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.task_id(), task.id());
            kinds.push(event.kind());
        }
        assert_eq!(
            kinds,
            vec![
                "occurrence_scheduled",
                "occurrence_started",
                "occurrence_completed",
                "occurrence_scheduled",
                "occurrence_skipped",
                "task_done",
            ]
        );
    }
}
