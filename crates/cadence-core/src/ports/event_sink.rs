//! EventSink port - イベント記録の抽象化
//!
//! # 実装
//! - NoopEventSink: 何もしない
//! - TracingEventSink: tracing へログ出力（impls）
//! - ChannelEventSink: tokio mpsc へ送信（impls、観測・テスト用）

use crate::domain::SchedulerEvent;

/// EventSink はスケジューライベントを受け取る
///
/// `emit` は worker 上で同期的に呼ばれるため、ブロックしないこと。
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SchedulerEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: SchedulerEvent) {}
}
