//! Common test infrastructure
//!
//! Every scenario runs on paused tokio time with a `TokioClock`, so "sleep 10s"
//! completes instantly and time-based assertions are exact.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cadence_core::domain::{BoxError, SchedulerEvent};
use cadence_core::impls::ChannelEventSink;
use cadence_core::ports::{Clock, EventSink, NoopEventSink, TokioClock};
use cadence_core::{ManagedScheduler, ManagedSchedulerBuilder};
use tokio::sync::mpsc::UnboundedReceiver;

pub struct TestScheduler {
    pub scheduler: ManagedScheduler,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self::with_sink(Arc::new(NoopEventSink))
    }

    pub fn with_events() -> (Self, UnboundedReceiver<SchedulerEvent>) {
        let (sink, rx) = ChannelEventSink::new();
        (Self::with_sink(Arc::new(sink)), rx)
    }

    pub fn with_sink(events: Arc<dyn EventSink>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let scheduler = ManagedSchedulerBuilder::new()
            .name("scenario")
            .pool_size(4)
            .clock(clock)
            .event_sink(events)
            .build()
            .expect("scheduler builds inside a runtime");
        Self { scheduler }
    }
}

/// Work returning how many times it has run so far (1-based).
pub fn counting_work(
    counter: Arc<AtomicUsize>,
) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = Result<usize, BoxError>> + Send>> + Send + Sync + 'static
{
    move || {
        let counter = Arc::clone(&counter);
        Box::pin(async move { Ok::<_, BoxError>(counter.fetch_add(1, Ordering::SeqCst) + 1) })
    }
}

/// Let spawned tasks (including aborted ones being dropped) make progress.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Poll `check` on real time until it holds, for up to 5s.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..5000 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    false
}

pub fn drain(rx: &mut UnboundedReceiver<SchedulerEvent>) -> Vec<SchedulerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
