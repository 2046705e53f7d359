//! OneShotTask - 1 回だけ実行されるタスク
//!
//! ManagedFuture の listener としては最小の実装です。handle は作成後に差し替わりません。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::app::recurring::TaskContext;
use crate::domain::{ScheduleError, SchedulerEvent, TaskId};
use crate::ports::{OccurrenceHandle, TaskListener, Work, schedule_occurrence};

/// A task with exactly one occurrence.
pub struct OneShotTask<T> {
    id: TaskId,
    handle: OccurrenceHandle<T>,
}

impl<T> OneShotTask<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Submit `work` to run once at `at`.
    pub fn schedule(
        work: Arc<dyn Work<T>>,
        at: DateTime<Utc>,
        ctx: &TaskContext,
    ) -> Result<Arc<Self>, ScheduleError> {
        let task_id = ctx.ids.generate_task_id();
        let occurrence_id = ctx.ids.generate_occurrence_id();
        let events = Arc::clone(&ctx.events);

        let run = async move {
            events.emit(SchedulerEvent::OccurrenceStarted {
                task_id,
                occurrence_id,
                sequence: 1,
            });
            let result = match AssertUnwindSafe(work.run()).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(ScheduleError::work_failed(err)),
                Err(panic) => Err(ScheduleError::from_panic(panic)),
            };
            match &result {
                Ok(_) => events.emit(SchedulerEvent::OccurrenceCompleted {
                    task_id,
                    occurrence_id,
                    sequence: 1,
                }),
                Err(err) => {
                    warn!(%task_id, occurrence = %occurrence_id, error = %err, "One-shot task failed");
                    events.emit(SchedulerEvent::OccurrenceFailed {
                        task_id,
                        occurrence_id,
                        sequence: 1,
                        error: err.to_string(),
                    });
                }
            }
            result
        };

        let handle = schedule_occurrence(ctx.executor.as_ref(), occurrence_id, at, run, move |exit| {
            debug!(%task_id, occurrence = %occurrence_id, ?exit, "One-shot task finished");
        })?;

        ctx.events.emit(SchedulerEvent::OccurrenceScheduled {
            task_id,
            occurrence_id,
            sequence: 1,
            scheduled_at: at,
        });
        Ok(Arc::new(Self {
            id: task_id,
            handle,
        }))
    }

    pub fn handle(&self) -> &OccurrenceHandle<T> {
        &self.handle
    }
}

impl<T> TaskListener<T> for OneShotTask<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn task_id(&self) -> TaskId {
        self.id
    }

    fn current(&self) -> Option<OccurrenceHandle<T>> {
        Some(self.handle.clone())
    }

    fn is_overall_done(&self) -> bool {
        self.handle.is_done()
    }

    fn is_latest_skipped(&self) -> bool {
        false
    }

    // nothing to stop; there is no next occurrence
    fn cancel_future_scheduling(&self) {}

    fn is_future_scheduling_cancelled(&self) -> bool {
        false
    }

    fn terminal_error(&self) -> Option<ScheduleError> {
        None
    }
}
