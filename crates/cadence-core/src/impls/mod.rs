//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **TokioExecutor**: tokio runtime 上の遅延実行（bounded worker pool）
//! - **IntervalTrigger / TimetableTrigger**: 組み込みの trigger
//! - **TracingEventSink / ChannelEventSink / FanoutEventSink**: イベントの出力先

pub mod event_sinks;
pub mod tokio_executor;
pub mod triggers;

// 主要な型を再エクスポート
pub use self::event_sinks::{ChannelEventSink, FanoutEventSink, TracingEventSink};
pub use self::tokio_executor::TokioExecutor;
pub use self::triggers::{IntervalMode, IntervalTrigger, TimetableTrigger};
