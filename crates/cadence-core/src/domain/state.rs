//! State - task と occurrence の状態
//!
//! # 状態遷移（RecurringTask）
//! - Idle -> Scheduled -> Running -> Completed | Failed -> Scheduled | Done
//! - Scheduled -> Skipped -> Scheduled | Done（skip は Running を経由しない）

use serde::{Deserialize, Serialize};

/// TaskState is the state of a whole recurring task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Submitted, first occurrence not yet computed.
    Idle,
    /// An occurrence is waiting for its time.
    Scheduled,
    /// The current occurrence is executing the work.
    Running,
    /// The latest occurrence was skipped.
    Skipped,
    /// The latest occurrence completed.
    Completed,
    /// The latest occurrence failed.
    Failed,
    /// Terminal: no occurrence will ever be created again.
    Done,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done)
    }
}

/// OccurrenceState is the state of a single scheduled attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccurrenceState {
    Pending,
    Running,
    Skipped,
    Completed,
    Failed,
    Cancelled,
}

impl OccurrenceState {
    /// Terminal per-occurrence states. The next occurrence is only created after one of these.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OccurrenceState::Skipped
                | OccurrenceState::Completed
                | OccurrenceState::Failed
                | OccurrenceState::Cancelled
        )
    }
}

/// Why a task reached `TaskState::Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    /// The trigger returned no next run time.
    Exhausted,
    /// Scheduling was cancelled by the caller.
    Cancelled,
    /// The trigger returned an error.
    TriggerFailed,
    /// The executor rejected the next occurrence.
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pending(OccurrenceState::Pending, false)]
    #[case::running(OccurrenceState::Running, false)]
    #[case::skipped(OccurrenceState::Skipped, true)]
    #[case::completed(OccurrenceState::Completed, true)]
    #[case::failed(OccurrenceState::Failed, true)]
    #[case::cancelled(OccurrenceState::Cancelled, true)]
    fn occurrence_terminal_states(#[case] state: OccurrenceState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn only_done_is_terminal_for_tasks() {
        assert!(TaskState::Done.is_terminal());
        assert!(!TaskState::Skipped.is_terminal());
        assert!(!TaskState::Idle.is_terminal());
    }

    #[test]
    fn occurrence_state_serializes_upper_case() {
        let s = serde_json::to_string(&OccurrenceState::Skipped).unwrap();
        assert_eq!(s, "\"SKIPPED\"");
    }
}
