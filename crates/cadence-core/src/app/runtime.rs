//! ManagedScheduler - タスク投入の表面
//!
//! # 提供する操作
//! - `schedule(work, trigger)`: trigger 駆動の繰り返し実行 → TriggerManagedFuture
//! - `submit(work)`: 今すぐ 1 回だけ実行 → ManagedFuture
//! - `schedule_once(work, delay)`: delay 後に 1 回だけ実行 → ManagedFuture
//! - `shutdown` / `shutdown_and_wait`: executor の停止

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::app::config::SchedulerConfig;
use crate::app::future::{ManagedFuture, TriggerManagedFuture};
use crate::app::one_shot::OneShotTask;
use crate::app::recurring::{RecurringTask, TaskContext};
use crate::domain::ScheduleError;
use crate::impls::TokioExecutor;
use crate::ports::{TaskListener, Trigger, Work};

/// Submission surface of the scheduler. Build one with
/// [`ManagedSchedulerBuilder`](crate::app::ManagedSchedulerBuilder).
pub struct ManagedScheduler {
    config: SchedulerConfig,
    executor: Arc<TokioExecutor>,
    ctx: TaskContext,
}

impl ManagedScheduler {
    pub(crate) fn new(config: SchedulerConfig, executor: Arc<TokioExecutor>, ctx: TaskContext) -> Self {
        Self {
            config,
            executor,
            ctx,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run `work` repeatedly at the times `trigger` computes.
    ///
    /// The returned future always follows the task's current occurrence. A trigger that
    /// yields no first time is not an error here; `get` reports it.
    ///
    /// # Errors
    /// `ScheduleError::Rejected` if the scheduler is shut down.
    pub fn schedule<T, W, G>(&self, work: W, trigger: G) -> Result<TriggerManagedFuture<T>, ScheduleError>
    where
        T: Clone + Send + Sync + 'static,
        W: Work<T> + 'static,
        G: Trigger + 'static,
    {
        let task = RecurringTask::new(Arc::new(work), Box::new(trigger), self.ctx.clone());
        debug!(scheduler = %self.config.name, task_id = %task.id(), "Scheduling recurring task");
        task.start()?;
        Ok(TriggerManagedFuture::new(task))
    }

    /// Run `work` once, as soon as a worker is free.
    pub fn submit<T, W>(&self, work: W) -> Result<ManagedFuture<T>, ScheduleError>
    where
        T: Clone + Send + Sync + 'static,
        W: Work<T> + 'static,
    {
        self.schedule_once(work, Duration::ZERO)
    }

    /// Run `work` once after `delay`.
    pub fn schedule_once<T, W>(&self, work: W, delay: Duration) -> Result<ManagedFuture<T>, ScheduleError>
    where
        T: Clone + Send + Sync + 'static,
        W: Work<T> + 'static,
    {
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        let at = self
            .ctx
            .clock
            .now()
            .checked_add_signed(delay)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);
        let task = OneShotTask::schedule(Arc::new(work), at, &self.ctx)?;
        let listener: Arc<dyn TaskListener<T>> = task;
        Ok(ManagedFuture::new(listener))
    }

    pub fn is_shutdown(&self) -> bool {
        self.executor.is_shutdown()
    }

    /// Stop accepting work and drop occurrences that have not started yet.
    ///
    /// Tasks whose next occurrence is refused end with `DoneReason::Rejected`.
    pub fn shutdown(&self) {
        info!(scheduler = %self.config.name, "Shutting down scheduler");
        self.executor.shutdown();
    }

    /// `shutdown`, then wait up to `shutdown_grace_ms` for running occurrences.
    pub async fn shutdown_and_wait(&self) -> bool {
        info!(scheduler = %self.config.name, "Shutting down scheduler");
        self.executor
            .shutdown_and_wait(self.config.shutdown_grace())
            .await
    }
}
