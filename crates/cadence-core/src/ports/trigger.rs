//! Trigger port - 次回実行時刻と skip 判定
//!
//! Trigger は純粋関数として設計されます（history + now → next / skip）。
//! 1 つの Trigger は 1 つの RecurringTask が専有し、task 間で状態を共有しません。

use chrono::{DateTime, Utc};

use crate::domain::{BoxError, ExecutionHistory};

/// Everything a trigger may look at when making a decision.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext<'a> {
    pub history: &'a ExecutionHistory,
    pub now: DateTime<Utc>,
}

impl<'a> TriggerContext<'a> {
    pub fn new(history: &'a ExecutionHistory, now: DateTime<Utc>) -> Self {
        Self { history, now }
    }
}

/// Trigger decides when a recurring task runs next and whether a due run is skipped.
///
/// - `next_run_time` returning `Ok(None)` ends the task permanently.
/// - `skip_run` returning `Ok(true)` consumes the occurrence without running the work.
/// - Either method returning `Err` ends the task and records the error as its
///   terminal outcome.
pub trait Trigger: Send + Sync {
    fn next_run_time(&self, ctx: &TriggerContext<'_>) -> Result<Option<DateTime<Utc>>, BoxError>;

    fn skip_run(
        &self,
        _ctx: &TriggerContext<'_>,
        _scheduled_at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        Ok(false)
    }
}

impl<T: Trigger + ?Sized> Trigger for Box<T> {
    fn next_run_time(&self, ctx: &TriggerContext<'_>) -> Result<Option<DateTime<Utc>>, BoxError> {
        self.as_ref().next_run_time(ctx)
    }

    fn skip_run(&self, ctx: &TriggerContext<'_>, scheduled_at: DateTime<Utc>) -> Result<bool, BoxError> {
        self.as_ref().skip_run(ctx, scheduled_at)
    }
}
