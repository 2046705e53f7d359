//! TaskListener port - future から task 側への問い合わせ
//!
//! ManagedFuture は occurrence の handle を直接保持せず、毎回 listener に問い合わせます。
//! 繰り返しタスクでは handle が occurrence ごとに差し替わるためです。

use crate::domain::{ScheduleError, TaskId};
use crate::ports::executor::OccurrenceHandle;

/// The task-level capability set a managed future delegates to.
///
/// Two variants exist: `OneShotTask` (a single occurrence) and `RecurringTask`.
pub trait TaskListener<T>: Send + Sync {
    fn task_id(&self) -> TaskId;

    /// The occurrence currently governing retrieval, if any was ever scheduled.
    fn current(&self) -> Option<OccurrenceHandle<T>>;

    /// No further occurrence will ever be created.
    fn is_overall_done(&self) -> bool;

    /// The most recently finished occurrence was skipped.
    fn is_latest_skipped(&self) -> bool;

    /// Stop creating occurrences. Does not touch the current one.
    fn cancel_future_scheduling(&self);

    fn is_future_scheduling_cancelled(&self) -> bool;

    /// Error that ended the task as a whole, if any.
    fn terminal_error(&self) -> Option<ScheduleError>;
}
