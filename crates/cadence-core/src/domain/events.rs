//! Events - スケジューラで発生したイベント
//!
//! EventSink に渡され、ログ出力や外部への通知に使われます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{OccurrenceId, TaskId};
use super::state::DoneReason;

/// SchedulerEvent describes one step of a task's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    OccurrenceScheduled {
        task_id: TaskId,
        occurrence_id: OccurrenceId,
        sequence: u64,
        scheduled_at: DateTime<Utc>,
    },
    OccurrenceStarted {
        task_id: TaskId,
        occurrence_id: OccurrenceId,
        sequence: u64,
    },
    OccurrenceSkipped {
        task_id: TaskId,
        occurrence_id: OccurrenceId,
        sequence: u64,
    },
    OccurrenceCompleted {
        task_id: TaskId,
        occurrence_id: OccurrenceId,
        sequence: u64,
    },
    OccurrenceFailed {
        task_id: TaskId,
        occurrence_id: OccurrenceId,
        sequence: u64,
        error: String,
    },
    OccurrenceCancelled {
        task_id: TaskId,
        occurrence_id: OccurrenceId,
        sequence: u64,
    },
    SchedulingCancelled {
        task_id: TaskId,
    },
    TaskDone {
        task_id: TaskId,
        reason: DoneReason,
    },
}

impl SchedulerEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            SchedulerEvent::OccurrenceScheduled { task_id, .. }
            | SchedulerEvent::OccurrenceStarted { task_id, .. }
            | SchedulerEvent::OccurrenceSkipped { task_id, .. }
            | SchedulerEvent::OccurrenceCompleted { task_id, .. }
            | SchedulerEvent::OccurrenceFailed { task_id, .. }
            | SchedulerEvent::OccurrenceCancelled { task_id, .. }
            | SchedulerEvent::SchedulingCancelled { task_id }
            | SchedulerEvent::TaskDone { task_id, .. } => *task_id,
        }
    }

    /// Short name used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerEvent::OccurrenceScheduled { .. } => "occurrence_scheduled",
            SchedulerEvent::OccurrenceStarted { .. } => "occurrence_started",
            SchedulerEvent::OccurrenceSkipped { .. } => "occurrence_skipped",
            SchedulerEvent::OccurrenceCompleted { .. } => "occurrence_completed",
            SchedulerEvent::OccurrenceFailed { .. } => "occurrence_failed",
            SchedulerEvent::OccurrenceCancelled { .. } => "occurrence_cancelled",
            SchedulerEvent::SchedulingCancelled { .. } => "scheduling_cancelled",
            SchedulerEvent::TaskDone { .. } => "task_done",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_kind() {
        let task_id = TaskId::generate();
        let event = SchedulerEvent::TaskDone {
            task_id,
            reason: DoneReason::Exhausted,
        };

        let v: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(v["event"], event.kind());
        assert_eq!(v["reason"], "exhausted");
        assert_eq!(event.task_id(), task_id);
    }
}
