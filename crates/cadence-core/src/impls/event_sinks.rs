//! EventSink の実装
//!
//! - TracingEventSink: tracing へ構造化ログとして出力
//! - ChannelEventSink: tokio の unbounded channel へ送信（観測・テスト用）

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::SchedulerEvent;
use crate::ports::EventSink;

/// Logs every event through `tracing`.
///
/// Failures and terminal events are logged at `warn`/`info`; per-occurrence
/// progress at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: SchedulerEvent) {
        let task_id = event.task_id();
        let kind = event.kind();
        match &event {
            SchedulerEvent::OccurrenceScheduled {
                occurrence_id,
                sequence,
                scheduled_at,
                ..
            } => debug!(%task_id, %occurrence_id, sequence, %scheduled_at, kind, "Occurrence scheduled"),
            SchedulerEvent::OccurrenceStarted {
                occurrence_id, sequence, ..
            } => debug!(%task_id, %occurrence_id, sequence, kind, "Occurrence started"),
            SchedulerEvent::OccurrenceSkipped {
                occurrence_id, sequence, ..
            } => info!(%task_id, %occurrence_id, sequence, kind, "Occurrence skipped"),
            SchedulerEvent::OccurrenceCompleted {
                occurrence_id, sequence, ..
            } => debug!(%task_id, %occurrence_id, sequence, kind, "Occurrence completed"),
            SchedulerEvent::OccurrenceFailed {
                occurrence_id,
                sequence,
                error,
                ..
            } => warn!(%task_id, %occurrence_id, sequence, kind, error = %error, "Occurrence failed"),
            SchedulerEvent::OccurrenceCancelled {
                occurrence_id, sequence, ..
            } => info!(%task_id, %occurrence_id, sequence, kind, "Occurrence cancelled"),
            SchedulerEvent::SchedulingCancelled { .. } => {
                info!(%task_id, kind, "Scheduling cancelled")
            }
            SchedulerEvent::TaskDone { reason, .. } => {
                info!(%task_id, kind, reason = ?reason, "Task done")
            }
        }
    }
}

/// Forwards events to an unbounded channel.
///
/// Events emitted after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<SchedulerEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SchedulerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: SchedulerEvent) {
        let _ = self.tx.send(event);
    }
}

/// Sends each event to every inner sink, in order.
#[derive(Default)]
pub struct FanoutEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl EventSink for FanoutEventSink {
    fn emit(&self, event: SchedulerEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}
