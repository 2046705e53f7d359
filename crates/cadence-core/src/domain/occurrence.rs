//! Occurrence records and the execution history handed to triggers.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::OccurrenceId;
use super::state::OccurrenceState;

/// The folded outcome of one finished occurrence.
///
/// Records:
/// - when it was supposed to run (`scheduled_at`)
/// - when it actually ran (`started_at` / `finished_at`)
/// - how it ended (`state`, `error`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceRecord {
    pub id: OccurrenceId,

    /// 1-based position in the schedule.
    pub sequence: u64,

    pub scheduled_at: DateTime<Utc>,

    /// `None` for occurrences that never started (skipped or cancelled while pending).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: DateTime<Utc>,

    pub state: OccurrenceState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OccurrenceRecord {
    pub fn completed(
        id: OccurrenceId,
        sequence: u64,
        scheduled_at: DateTime<Utc>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sequence,
            scheduled_at,
            started_at: Some(started_at),
            finished_at,
            state: OccurrenceState::Completed,
            error: None,
        }
    }

    pub fn failed(
        id: OccurrenceId,
        sequence: u64,
        scheduled_at: DateTime<Utc>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id,
            sequence,
            scheduled_at,
            started_at: Some(started_at),
            finished_at,
            state: OccurrenceState::Failed,
            error: Some(error.into()),
        }
    }

    pub fn skipped(
        id: OccurrenceId,
        sequence: u64,
        scheduled_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sequence,
            scheduled_at,
            started_at: None,
            finished_at,
            state: OccurrenceState::Skipped,
            error: None,
        }
    }

    pub fn cancelled(
        id: OccurrenceId,
        sequence: u64,
        scheduled_at: DateTime<Utc>,
        started_at: Option<DateTime<Utc>>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sequence,
            scheduled_at,
            started_at,
            finished_at,
            state: OccurrenceState::Cancelled,
            error: None,
        }
    }

    /// Delay between the scheduled time and the actual start.
    pub fn lateness(&self) -> Option<chrono::Duration> {
        self.started_at.map(|started| started - self.scheduled_at)
    }
}

/// Cumulative counters; unlike the retained records these are never truncated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCounts {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub cancelled: u64,
}

/// Ordered history of finished occurrences for one task.
///
/// `limit` bounds how many records are retained (oldest dropped first).
/// Triggers that count runs should use `counts()`, which always covers the full history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionHistory {
    submitted_at: DateTime<Utc>,
    records: VecDeque<OccurrenceRecord>,
    limit: Option<usize>,
    counts: HistoryCounts,
}

impl ExecutionHistory {
    pub fn new(submitted_at: DateTime<Utc>, limit: Option<usize>) -> Self {
        Self {
            submitted_at,
            records: VecDeque::new(),
            limit,
            counts: HistoryCounts::default(),
        }
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn push(&mut self, record: OccurrenceRecord) {
        self.counts.total += 1;
        match record.state {
            OccurrenceState::Completed => self.counts.completed += 1,
            OccurrenceState::Failed => self.counts.failed += 1,
            OccurrenceState::Skipped => self.counts.skipped += 1,
            OccurrenceState::Cancelled => self.counts.cancelled += 1,
            OccurrenceState::Pending | OccurrenceState::Running => {}
        }
        self.records.push_back(record);
        if let Some(limit) = self.limit {
            while self.records.len() > limit {
                self.records.pop_front();
            }
        }
    }

    /// The most recently finished occurrence.
    pub fn last(&self) -> Option<&OccurrenceRecord> {
        self.records.back()
    }

    pub fn records(&self) -> impl Iterator<Item = &OccurrenceRecord> {
        self.records.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.total == 0
    }

    pub fn counts(&self) -> HistoryCounts {
        self.counts
    }

    /// Sequence number the next occurrence will carry.
    pub fn next_sequence(&self) -> u64 {
        self.counts.total + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(sec: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(sec)
    }

    #[test]
    fn counts_follow_terminal_states() {
        let mut history = ExecutionHistory::new(t(0), None);
        assert!(history.is_empty());
        assert_eq!(history.next_sequence(), 1);

        history.push(OccurrenceRecord::completed(OccurrenceId::generate(), 1, t(0), t(1), t(2)));
        history.push(OccurrenceRecord::skipped(OccurrenceId::generate(), 2, t(10), t(10)));
        history.push(OccurrenceRecord::failed(
            OccurrenceId::generate(),
            3,
            t(20),
            t(20),
            t(21),
            "boom",
        ));

        let counts = history.counts();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(history.next_sequence(), 4);
        assert_eq!(history.last().map(|r| r.state), Some(OccurrenceState::Failed));
    }

    #[test]
    fn limit_drops_oldest_records_but_keeps_counts() {
        let mut history = ExecutionHistory::new(t(0), Some(2));
        let ids: Vec<_> = (0..3).map(|_| OccurrenceId::generate()).collect();
        for (i, id) in ids.iter().enumerate() {
            let s = i as i64 * 10;
            history.push(OccurrenceRecord::completed(*id, i as u64 + 1, t(s), t(s), t(s + 1)));
        }

        assert_eq!(history.records().count(), 2);
        let kept: Vec<OccurrenceId> = history.records().map(|r| r.id).collect();
        assert_eq!(kept, ids[1..]);
        assert_eq!(history.counts().total, 3);
    }

    #[test]
    fn lateness_is_start_minus_schedule() {
        let rec = OccurrenceRecord::completed(OccurrenceId::generate(), 1, t(0), t(3), t(4));
        assert_eq!(rec.lateness(), Some(Duration::seconds(3)));

        let skipped = OccurrenceRecord::skipped(OccurrenceId::generate(), 2, t(10), t(10));
        assert_eq!(skipped.lateness(), None);
    }
}
