//! `sweep`: drive the host's progress tone from 0% to 100% unattended.

use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};
use progress_lib::{EngineStats, ProgressEngine};
use serde::Serialize;

use crate::host::SimulatedHost;

const WORKER_START_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub steps: u32,
    pub native_beeps: u64,
    pub stats: EngineStats,
}

fn wait_for_worker(engine: &ProgressEngine) -> bool {
    let deadline = Instant::now() + WORKER_START_TIMEOUT;
    while !engine.is_worker_running() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    true
}

/// Play `steps + 1` progress tones spaced `interval` apart, then give the
/// worker one poll interval to drain the last request.
pub fn run_sweep(
    engine: &ProgressEngine,
    host: &SimulatedHost,
    steps: u32,
    interval: Duration,
) -> SweepReport {
    if !wait_for_worker(engine) {
        warn!("sweep: playback worker not running, tones go to the host");
    }

    let steps = steps.max(1);
    for step in 0..=steps {
        let percent = step as f64 * 100.0 / steps as f64;
        host.progress_tone(percent);
        thread::sleep(interval);
    }
    thread::sleep(engine.config().poll_interval());

    let stats = engine.stats();
    info!(
        "sweep: {} tones, {} played, {} cache hits",
        steps + 1,
        stats.worker.played,
        stats.cache.hits
    );
    SweepReport {
        steps,
        native_beeps: host.native_beeps(),
        stats,
    }
}
