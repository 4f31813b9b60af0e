//! Tasklane demo
//!
//! Runs a heartbeat and a value-returning job on the periodic scheduler,
//! pauses halfway, then stops and prints the scheduler counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use tasklane::config::Settings;
use tasklane::logging::init_logging;
use tasklane::{Every, ExecConfig, Scheduler, Task};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "tasklane-demo")]
#[command(about = "Periodic task scheduler demo")]
#[command(version)]
struct Args {
    /// Period of the demo jobs, e.g. 2s, 1m.
    #[arg(long, env = "TASKLANE_DEMO_EVERY", default_value = "2s")]
    every: Every,

    /// How long to run before stopping, in seconds.
    #[arg(long, env = "TASKLANE_DEMO_RUN_FOR", default_value_t = 10)]
    run_for: u64,

    /// How long to stay paused halfway through, in seconds.
    #[arg(long, default_value_t = 2)]
    pause_for: u64,

    /// Settings file; overrides the default search.
    #[arg(short, long, env = "TASKLANE_CONFIG")]
    config: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    init_logging(&settings.logging).context("Failed to initialise logging")?;

    tracing::info!(
        every = %args.every,
        run_for_secs = args.run_for,
        "Starting tasklane demo v{}",
        env!("CARGO_PKG_VERSION")
    );

    let scheduler = Scheduler::from_settings(&settings)?;

    let beats = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&beats);
    scheduler.add_task(
        Task::new(move || {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::info!(beat = n, "Heartbeat");
        })
        .set_config(settings.task.clone().with_name("heartbeat")),
        args.every,
    );

    scheduler.add_task(
        Task::new(|| tasklane::schedule::local_now().format("%H:%M:%S").to_string())
            .set_config(ExecConfig::named("clock"))
            .on_complete(|stamp: String| tracing::info!(%stamp, "Clock read")),
        args.every,
    );

    scheduler.run(None)?;

    let half = Duration::from_secs(args.run_for / 2);
    std::thread::sleep(half);
    scheduler.pause();
    tracing::info!(lifecycle = ?scheduler.lifecycle(), "Holding");
    std::thread::sleep(Duration::from_secs(args.pause_for));
    scheduler.resume();
    std::thread::sleep(Duration::from_secs(args.run_for).saturating_sub(half));

    scheduler.stop();
    let stats = serde_json::to_string_pretty(&scheduler.stats())?;
    println!("{stats}");
    tracing::info!(heartbeats = beats.load(Ordering::Relaxed), "Demo finished");
    Ok(())
}
