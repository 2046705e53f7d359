//! cadence-core
//!
//! Trigger-driven recurring task scheduler.
//!
//! Work is submitted together with a [`Trigger`](ports::Trigger); the scheduler runs it
//! at the times the trigger computes from the execution history and hands back a
//! future that follows whichever occurrence is current.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, occurrence, state, errors, events）
//! - **ports**: 抽象化レイヤー（Trigger, Work, Executor, Clock, EventSink, TaskListener）
//! - **impls**: 実装（TokioExecutor, IntervalTrigger, TimetableTrigger, event sinks）
//! - **app**: アプリケーションロジック（RecurringTask, futures, ManagedScheduler, builder）
//!
//! # 使用例
//! ```ignore
//! let scheduler = ManagedSchedulerBuilder::new().pool_size(2).build()?;
//! let future = scheduler.schedule(
//!     || async { Ok::<_, BoxError>(fetch().await?) },
//!     IntervalTrigger::every(Duration::from_secs(60)),
//! )?;
//! let latest = future.get().await;
//! ```

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use crate::app::{
    BuildError, ManagedFuture, ManagedScheduler, ManagedSchedulerBuilder, SchedulerConfig,
    TriggerManagedFuture,
};
pub use crate::domain::{BoxError, DoneReason, ScheduleError, SchedulerEvent, TaskState};
pub use crate::impls::{IntervalTrigger, TimetableTrigger};
pub use crate::ports::{Trigger, TriggerContext, Work};
