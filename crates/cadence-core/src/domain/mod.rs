//! Domain model (ids, occurrence records, states, errors, events).

pub mod errors;
pub mod events;
pub mod ids;
pub mod occurrence;
pub mod state;

pub use self::errors::{BoxError, ScheduleError, SharedError};
pub use self::events::SchedulerEvent;
pub use self::ids::{OccurrenceId, TaskId};
pub use self::occurrence::{ExecutionHistory, HistoryCounts, OccurrenceRecord};
pub use self::state::{DoneReason, OccurrenceState, TaskState};
