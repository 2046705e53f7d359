use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::BoxError;
use crate::ports::{Trigger, TriggerContext};

/// How the next run time is derived from the previous occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalMode {
    /// `previous.scheduled_at + period`; late runs are caught up.
    #[default]
    FixedRate,
    /// `previous.finished_at + period`.
    FixedDelay,
}

/// [`IntervalTrigger`] runs a task every `period`, starting `initial_delay` after submission.
///
/// # Examples
///
/// ```ignore
/// // every 5 seconds, at most 10 times, skipping runs that start more than 1s late
/// let trigger = IntervalTrigger::every(Duration::from_secs(5))
///     .max_runs(10)
///     .skip_when_late(Duration::from_secs(1));
/// ```
///
/// `max_runs` counts every finished occurrence, skipped ones included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTrigger {
    initial_delay: TimeDelta,
    period: TimeDelta,
    mode: IntervalMode,
    max_runs: Option<u64>,
    late_tolerance: Option<TimeDelta>,
}

fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

impl IntervalTrigger {
    pub fn every(period: Duration) -> Self {
        Self {
            initial_delay: TimeDelta::zero(),
            period: to_delta(period),
            mode: IntervalMode::FixedRate,
            max_runs: None,
            late_tolerance: None,
        }
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = to_delta(delay);
        self
    }

    pub fn mode(mut self, mode: IntervalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_runs(mut self, runs: u64) -> Self {
        self.max_runs = Some(runs);
        self
    }

    pub fn skip_when_late(mut self, tolerance: Duration) -> Self {
        self.late_tolerance = Some(to_delta(tolerance));
        self
    }

    pub fn period(&self) -> TimeDelta {
        self.period
    }
}

impl Trigger for IntervalTrigger {
    fn next_run_time(&self, ctx: &TriggerContext<'_>) -> Result<Option<DateTime<Utc>>, BoxError> {
        if self.period <= TimeDelta::zero() {
            return Err("interval period must be positive".into());
        }
        if self.max_runs.is_some_and(|max| ctx.history.counts().total >= max) {
            return Ok(None);
        }

        let (base, step) = match ctx.history.last() {
            None => (ctx.history.submitted_at(), self.initial_delay),
            Some(last) => match self.mode {
                IntervalMode::FixedRate => (last.scheduled_at, self.period),
                IntervalMode::FixedDelay => (last.finished_at, self.period),
            },
        };
        base.checked_add_signed(step)
            .map(Some)
            .ok_or_else(|| format!("next run time {base} + {step} is out of range").into())
    }

    fn skip_run(&self, ctx: &TriggerContext<'_>, scheduled_at: DateTime<Utc>) -> Result<bool, BoxError> {
        Ok(match self.late_tolerance {
            Some(tolerance) => ctx.now - scheduled_at > tolerance,
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExecutionHistory, OccurrenceId, OccurrenceRecord};
    use chrono::TimeZone;
    use rstest::rstest;

    fn t(sec: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::seconds(sec)
    }

    fn history_with(records: &[(i64, i64)]) -> ExecutionHistory {
        let mut history = ExecutionHistory::new(t(0), None);
        for (i, (scheduled, finished)) in records.iter().enumerate() {
            history.push(OccurrenceRecord::completed(
                OccurrenceId::generate(),
                i as u64 + 1,
                t(*scheduled),
                t(*scheduled),
                t(*finished),
            ));
        }
        history
    }

    #[test]
    fn first_run_honors_initial_delay() {
        let trigger = IntervalTrigger::every(Duration::from_secs(10)).initial_delay(Duration::from_secs(3));
        let history = history_with(&[]);
        let next = trigger.next_run_time(&TriggerContext::new(&history, t(0))).unwrap();
        assert_eq!(next, Some(t(3)));
    }

    #[rstest]
    #[case::fixed_rate(IntervalMode::FixedRate, t(20))]
    #[case::fixed_delay(IntervalMode::FixedDelay, t(24))]
    fn next_run_follows_mode(#[case] mode: IntervalMode, #[case] expected: DateTime<Utc>) {
        let trigger = IntervalTrigger::every(Duration::from_secs(10)).mode(mode);
        let history = history_with(&[(0, 2), (10, 14)]);
        let next = trigger.next_run_time(&TriggerContext::new(&history, t(14))).unwrap();
        assert_eq!(next, Some(expected));
    }

    #[test]
    fn max_runs_exhausts_the_schedule() {
        let trigger = IntervalTrigger::every(Duration::from_secs(10)).max_runs(2);
        let history = history_with(&[(0, 1), (10, 11)]);
        let next = trigger.next_run_time(&TriggerContext::new(&history, t(11))).unwrap();
        assert_eq!(next, None);
    }

    #[test]
    fn zero_period_is_a_trigger_error() {
        let trigger = IntervalTrigger::every(Duration::ZERO);
        let history = history_with(&[]);
        assert!(trigger.next_run_time(&TriggerContext::new(&history, t(0))).is_err());
    }

    #[test]
    fn overflowing_period_is_a_trigger_error() {
        let trigger = IntervalTrigger::every(Duration::MAX);
        let history = history_with(&[(0, 1)]);
        let err = trigger.next_run_time(&TriggerContext::new(&history, t(1))).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[rstest]
    #[case::on_time(10, false)]
    #[case::within_tolerance(11, false)]
    #[case::too_late(13, true)]
    fn late_runs_are_skipped(#[case] now: i64, #[case] skipped: bool) {
        let trigger = IntervalTrigger::every(Duration::from_secs(10)).skip_when_late(Duration::from_secs(2));
        let history = history_with(&[(0, 1)]);
        let skip = trigger.skip_run(&TriggerContext::new(&history, t(now)), t(10)).unwrap();
        assert_eq!(skip, skipped);
    }
}
