//! cadence demo: run a recurring job from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use cadence_core::impls::{ChannelEventSink, FanoutEventSink, TracingEventSink};
use cadence_core::{
    BoxError, IntervalTrigger, ManagedSchedulerBuilder, SchedulerConfig, SchedulerEvent,
    TimetableTrigger, Trigger, TriggerManagedFuture, Work,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Run a demo job on the cadence scheduler.
#[derive(Parser)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// Path to a JSON scheduler configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the worker pool size.
    #[arg(long)]
    pool_size: Option<usize>,

    /// JSON payload handed to the job, e.g. '{"name":"cadence"}'.
    #[arg(long, default_value = r#"{"name":"cadence"}"#)]
    payload: String,

    /// Make the first N runs fail.
    #[arg(long, default_value_t = 0)]
    fail_first: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every PERIOD seconds.
    Interval {
        #[arg(long, default_value_t = 1)]
        period: u64,

        #[arg(long, default_value_t = 0)]
        initial_delay: u64,

        /// Stop after this many occurrences (skips included).
        #[arg(long)]
        max_runs: Option<u64>,

        /// Skip occurrences starting more than this many milliseconds late.
        #[arg(long)]
        skip_late_ms: Option<u64>,
    },

    /// Run at fixed offsets (seconds after start), then stop.
    Timetable {
        #[arg(long, value_delimiter = ',', required = true)]
        at: Vec<u64>,

        /// 1-based occurrence numbers to skip.
        #[arg(long, value_delimiter = ',')]
        skip: Vec<u64>,
    },

    /// Print the effective configuration as JSON.
    PrintConfig,
}

#[derive(Debug, Deserialize)]
struct HelloPayload {
    name: String,
}

struct HelloWork {
    payload: HelloPayload,
    runs: AtomicU32,
    remaining_failures: AtomicU32,
}

#[async_trait]
impl Work<u32> for HelloWork {
    async fn run(&self) -> Result<u32, BoxError> {
        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(format!("intentional failure (left={left})").into());
        }

        println!("Hello, {}! (run {run})", self.payload.name);
        Ok(run)
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SchedulerConfig> {
    let Some(path) = path else {
        return Ok(SchedulerConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    SchedulerConfig::from_json(&json).with_context(|| format!("parsing config file {}", path.display()))
}

fn build_trigger(command: Command) -> Box<dyn Trigger> {
    match command {
        Command::Interval {
            period,
            initial_delay,
            max_runs,
            skip_late_ms,
        } => {
            let mut trigger = IntervalTrigger::every(Duration::from_secs(period))
                .initial_delay(Duration::from_secs(initial_delay));
            if let Some(max) = max_runs {
                trigger = trigger.max_runs(max);
            }
            if let Some(ms) = skip_late_ms {
                trigger = trigger.skip_when_late(Duration::from_millis(ms));
            }
            Box::new(trigger)
        }
        Command::Timetable { at, skip } => {
            let trigger = TimetableTrigger::after(at.into_iter().map(Duration::from_secs));
            Box::new(skip.into_iter().fold(trigger, TimetableTrigger::skip_occurrence))
        }
        Command::PrintConfig => Box::new(TimetableTrigger::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(pool_size) = cli.pool_size {
        config.pool_size = pool_size;
    }
    if matches!(cli.command, Command::PrintConfig) {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let payload: HelloPayload = serde_json::from_str(&cli.payload).context("decoding --payload")?;
    let work = HelloWork {
        payload,
        runs: AtomicU32::new(0),
        remaining_failures: AtomicU32::new(cli.fail_first),
    };

    let (channel, mut events) = ChannelEventSink::new();
    let sink = FanoutEventSink::new().with(TracingEventSink).with(channel);
    let grace = config.shutdown_grace();
    let scheduler = ManagedSchedulerBuilder::new()
        .config(config)
        .event_sink(Arc::new(sink))
        .build()?;

    let future: TriggerManagedFuture<u32> = scheduler.schedule(work, build_trigger(cli.command))?;
    info!(task_id = %future.task_id(), "Job scheduled, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling the job");
                future.cancel(true);
            }
            event = events.recv() => match event {
                Some(SchedulerEvent::TaskDone { reason, .. }) => {
                    info!(reason = ?reason, "Job finished");
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    match future.get().await {
        Ok(value) => println!("last result: {value}"),
        Err(err) => println!("last result: {err}"),
    }
    let counts = future.history().counts();
    println!(
        "occurrences: total={} completed={} failed={} skipped={} cancelled={}",
        counts.total, counts.completed, counts.failed, counts.skipped, counts.cancelled
    );

    if !scheduler.shutdown_and_wait().await {
        warn!("Some occurrences were still running after {:?}", grace);
    }
    Ok(())
}
