//! Ports - 抽象化レイヤー
//!
//! 各 trait は差し替え可能な境界です。
//! - Trigger: 次回実行時刻と skip 判定（ユーザー実装）
//! - Work: occurrence ごとに実行される処理（ユーザー実装）
//! - Executor: 遅延実行（underlying scheduler）
//! - Clock: 時刻
//! - EventSink: イベント通知
//! - TaskListener: future から task への問い合わせ

pub mod clock;
pub mod event_sink;
pub mod executor;
pub mod id_generator;
pub mod listener;
pub mod trigger;
pub mod work;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock, TokioClock};
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::executor::{
    Executor, Job, JobControl, JobExit, OccurrenceHandle, PendingOccurrence, Rejected, prepare_occurrence,
    schedule_occurrence,
};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::listener::TaskListener;
pub use self::trigger::{Trigger, TriggerContext};
pub use self::work::Work;
