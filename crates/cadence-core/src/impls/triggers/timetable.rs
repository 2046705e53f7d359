use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::BoxError;
use crate::ports::{Trigger, TriggerContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Relative to the task's submission time.
    Offset(TimeDelta),
    At(DateTime<Utc>),
}

/// [`TimetableTrigger`] runs a task at an explicit list of times and then stops.
///
/// Occurrence numbers given to [`TimetableTrigger::skip_occurrence`] are 1-based and
/// are consumed without running the work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimetableTrigger {
    slots: Vec<Slot>,
    skipped: BTreeSet<u64>,
}

impl TimetableTrigger {
    /// Runs at each offset after submission, in the given order.
    pub fn after<I: IntoIterator<Item = Duration>>(offsets: I) -> Self {
        Self {
            slots: offsets
                .into_iter()
                .map(|d| Slot::Offset(TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)))
                .collect(),
            skipped: BTreeSet::new(),
        }
    }

    /// Runs at each absolute time, in the given order.
    pub fn at<I: IntoIterator<Item = DateTime<Utc>>>(times: I) -> Self {
        Self {
            slots: times.into_iter().map(Slot::At).collect(),
            skipped: BTreeSet::new(),
        }
    }

    pub fn skip_occurrence(mut self, sequence: u64) -> Self {
        self.skipped.insert(sequence);
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Trigger for TimetableTrigger {
    fn next_run_time(&self, ctx: &TriggerContext<'_>) -> Result<Option<DateTime<Utc>>, BoxError> {
        let index = usize::try_from(ctx.history.counts().total)?;
        match self.slots.get(index) {
            None => Ok(None),
            Some(Slot::At(at)) => Ok(Some(*at)),
            Some(Slot::Offset(offset)) => {
                let submitted_at = ctx.history.submitted_at();
                submitted_at
                    .checked_add_signed(*offset)
                    .map(Some)
                    .ok_or_else(|| format!("slot {} ({submitted_at} + {offset}) is out of range", index + 1).into())
            }
        }
    }

    fn skip_run(&self, ctx: &TriggerContext<'_>, _scheduled_at: DateTime<Utc>) -> Result<bool, BoxError> {
        Ok(self.skipped.contains(&ctx.history.next_sequence()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExecutionHistory, OccurrenceId, OccurrenceRecord};
    use chrono::TimeZone;

    fn t(sec: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::seconds(sec)
    }

    #[test]
    fn walks_the_table_then_stops() {
        let trigger = TimetableTrigger::after([
            Duration::from_secs(0),
            Duration::from_secs(10),
        ]);
        let mut history = ExecutionHistory::new(t(100), None);
        let ctx_now = t(100);

        assert_eq!(
            trigger.next_run_time(&TriggerContext::new(&history, ctx_now)).unwrap(),
            Some(t(100))
        );
        history.push(OccurrenceRecord::completed(OccurrenceId::generate(), 1, t(100), t(100), t(101)));
        assert_eq!(
            trigger.next_run_time(&TriggerContext::new(&history, ctx_now)).unwrap(),
            Some(t(110))
        );
        history.push(OccurrenceRecord::completed(OccurrenceId::generate(), 2, t(110), t(110), t(111)));
        assert_eq!(trigger.next_run_time(&TriggerContext::new(&history, ctx_now)).unwrap(), None);
    }

    #[test]
    fn skips_by_sequence_number() {
        let trigger = TimetableTrigger::at([t(0), t(10), t(20)]).skip_occurrence(2);
        let mut history = ExecutionHistory::new(t(0), None);

        assert!(!trigger.skip_run(&TriggerContext::new(&history, t(0)), t(0)).unwrap());
        history.push(OccurrenceRecord::completed(OccurrenceId::generate(), 1, t(0), t(0), t(1)));
        assert!(trigger.skip_run(&TriggerContext::new(&history, t(10)), t(10)).unwrap());
    }

    #[test]
    fn empty_table_never_runs() {
        let trigger = TimetableTrigger::default();
        let history = ExecutionHistory::new(t(0), None);
        assert!(trigger.is_empty());
        assert_eq!(trigger.next_run_time(&TriggerContext::new(&history, t(0))).unwrap(), None);
    }

    #[test]
    fn overflowing_offset_is_a_trigger_error() {
        let trigger = TimetableTrigger::after([Duration::MAX]);
        let history = ExecutionHistory::new(t(0), None);
        let err = trigger.next_run_time(&TriggerContext::new(&history, t(0))).unwrap_err();
        assert!(err.to_string().contains("slot 1"));
    }
}
