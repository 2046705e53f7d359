//! Errors - 実行エラーの分類
//!
//! occurrence 単位のエラー（WorkFailed / Skipped / Cancelled）と、
//! task 全体を終わらせるエラー（TriggerFailed）を区別します。

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error type returned by user-supplied work and triggers.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared form of a user error so a recorded outcome can be handed to every `get` caller.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// ScheduleError is what callers of `get` observe.
///
/// `Clone` is required: a finished occurrence keeps its result and returns it on
/// every retrieval.
#[derive(Debug, Clone, Error)]
pub enum ScheduleError {
    /// The wrapped work returned an error (or panicked) while running.
    #[error("work failed: {0}")]
    WorkFailed(#[source] SharedError),

    /// The trigger decided the latest occurrence should not run.
    #[error("occurrence was skipped by its trigger")]
    Skipped,

    /// The occurrence (and possibly the schedule) was cancelled.
    #[error("occurrence was cancelled")]
    Cancelled,

    /// The trigger itself failed; this ends the whole task.
    #[error("trigger failed: {0}")]
    TriggerFailed(#[source] SharedError),

    /// `get_timeout` gave up waiting. Nothing was cancelled.
    #[error("timed out after {0:?} waiting for occurrence")]
    Timeout(Duration),

    /// The trigger produced no occurrence at all.
    #[error("trigger produced no occurrence to wait for")]
    NotScheduled,

    /// The executor refused the submission (e.g. after shutdown).
    #[error("submission rejected: {0}")]
    Rejected(String),
}

impl ScheduleError {
    pub fn work_failed(err: BoxError) -> Self {
        ScheduleError::WorkFailed(Arc::from(err))
    }

    pub fn trigger_failed(err: BoxError) -> Self {
        ScheduleError::TriggerFailed(Arc::from(err))
    }

    /// Build a `WorkFailed` from a panic payload caught at the worker boundary.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        Self::work_failed(panic_message(payload).into())
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ScheduleError::Skipped)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScheduleError::Cancelled)
    }
}

pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn work_failed_keeps_source_message() {
        let err = ScheduleError::work_failed("disk full".into());
        assert_eq!(err.to_string(), "work failed: disk full");
        assert!(err.source().is_some());
    }

    #[test]
    fn skipped_is_distinct_from_cancelled() {
        assert!(ScheduleError::Skipped.is_skipped());
        assert!(!ScheduleError::Skipped.is_cancelled());
        assert!(ScheduleError::Cancelled.is_cancelled());
    }

    #[test]
    fn panic_payloads_are_readable() {
        let err = ScheduleError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "work failed: panicked: boom");

        let err = ScheduleError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err.to_string(), "work failed: panicked: owned boom");

        let err = ScheduleError::from_panic(Box::new(42_u8));
        assert_eq!(err.to_string(), "work failed: panicked");
    }

    #[test]
    fn cloned_errors_share_the_source() {
        let err = ScheduleError::trigger_failed("bad calendar".into());
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
