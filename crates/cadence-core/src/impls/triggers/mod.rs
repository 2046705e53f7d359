//! Built-in triggers.
//!
//! Expression syntaxes (cron and friends) are intentionally absent; these are
//! programmatic policies built from durations and explicit times.

mod interval;
mod timetable;

pub use self::interval::{IntervalMode, IntervalTrigger};
pub use self::timetable::TimetableTrigger;
