//! Background playback worker.
//!
//! The worker is split so responsibilities are explicit:
//! - [`context`] defines the state captured at spawn time.
//! - [`guard`] tracks thread liveness.
//! - [`runner`] executes the poll/map/synthesize/write loop.
//!
//! One worker generation runs per applied configuration. Reconfiguration
//! stops the current generation and starts a new one; the last handled
//! request id survives across generations so nothing is played twice.

mod context;
mod guard;
mod runner;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::cache::ClipCache;
use crate::channel::{RequestChannel, NO_REQUEST};
use crate::config::PlaybackConfig;
use crate::error::Result;
use crate::sink::{AudioBackend, StreamSettings};
use crate::tools::lock;

use context::WorkerContext;

/// How long `stop` waits for the thread before detaching it.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(1500);

const JOIN_POLL_MS: u64 = 5;

/// Lifecycle of the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl WorkerState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default)]
struct WorkerCounters {
    played: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    reopens: AtomicU64,
}

/// Snapshot of the worker's counters, cumulative across generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub played: u64,
    /// Requests consumed while playback was disabled.
    pub skipped: u64,
    /// Requests dropped because synthesis or the sink failed.
    pub failed: u64,
    /// Output stream reopens after an inactive stream or failed write.
    pub reopens: u64,
}

/// Cheap, cloneable view of whether any worker thread is alive.
#[derive(Debug, Clone, Default)]
pub struct WorkerLiveness {
    live_threads: Arc<AtomicUsize>,
}

impl WorkerLiveness {
    pub fn is_running(&self) -> bool {
        self.live_threads.load(Ordering::SeqCst) > 0
    }

    #[cfg(test)]
    pub(crate) fn always_running() -> Self {
        Self {
            live_threads: Arc::new(AtomicUsize::new(1)),
        }
    }
}

/// Inputs for one worker generation.
pub struct WorkerSetup {
    pub channel: Arc<RequestChannel>,
    pub cache: Arc<Mutex<ClipCache>>,
    pub enabled: Arc<AtomicBool>,
    pub backend: Arc<dyn AudioBackend>,
    pub settings: StreamSettings,
    pub config: PlaybackConfig,
}

/// Owner of the playback thread.
pub struct PlaybackWorker {
    state: Arc<Mutex<WorkerState>>,
    abort: Arc<AtomicBool>,
    liveness: WorkerLiveness,
    last_seen: Arc<AtomicU64>,
    counters: Arc<WorkerCounters>,
    handle: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl Default for PlaybackWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackWorker {
    pub fn new() -> Self {
        Self::with_join_timeout(DEFAULT_JOIN_TIMEOUT)
    }

    pub fn with_join_timeout(join_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(WorkerState::Stopped)),
            abort: Arc::new(AtomicBool::new(false)),
            liveness: WorkerLiveness::default(),
            last_seen: Arc::new(AtomicU64::new(NO_REQUEST)),
            counters: Arc::new(WorkerCounters::default()),
            handle: None,
            join_timeout,
        }
    }

    pub fn state(&self) -> WorkerState {
        *lock(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.liveness.is_running()
    }

    pub fn liveness(&self) -> WorkerLiveness {
        self.liveness.clone()
    }

    /// Id of the last request the worker consumed.
    pub fn last_handled_id(&self) -> u64 {
        self.last_seen.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            played: self.counters.played.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            reopens: self.counters.reopens.load(Ordering::Relaxed),
        }
    }

    /// Spawn a worker generation. Returns `Ok(false)` when one is already
    /// running. A generation whose thread died is reaped and replaced.
    pub fn start(&mut self, setup: WorkerSetup) -> Result<bool> {
        {
            let mut state = lock(&self.state);
            if let Some(handle) = &self.handle {
                if !handle.is_finished() {
                    debug!("playback worker already {}", *state);
                    return Ok(false);
                }
            }
            if let Some(handle) = self.handle.take() {
                if handle.join().is_err() {
                    error!("start: previous playback worker panicked");
                }
            }
            *state = WorkerState::Starting;
        }

        self.abort = Arc::new(AtomicBool::new(false));
        let context = WorkerContext {
            channel: setup.channel,
            cache: setup.cache,
            enabled: setup.enabled,
            abort: self.abort.clone(),
            live_threads: self.liveness.live_threads.clone(),
            state: self.state.clone(),
            last_seen: self.last_seen.clone(),
            counters: self.counters.clone(),
            backend: setup.backend,
            settings: setup.settings,
            config: setup.config,
        };

        let spawned = thread::Builder::new()
            .name("progress-playback".into())
            .spawn(move || runner::run_worker_thread(context));
        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(true)
            }
            Err(err) => {
                *lock(&self.state) = WorkerState::Stopped;
                error!("start: could not spawn playback worker: {}", err);
                Err(err.into())
            }
        }
    }

    /// Signal the loop to exit and wait up to the join timeout.
    ///
    /// Returns `false` when the thread had to be detached.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            *lock(&self.state) = WorkerState::Stopped;
            return true;
        };

        *lock(&self.state) = WorkerState::Stopping;
        self.abort.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + self.join_timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(JOIN_POLL_MS));
        }

        let exited = if handle.is_finished() {
            if handle.join().is_err() {
                error!("stop: playback worker panicked");
            }
            true
        } else {
            warn!(
                "stop: playback worker did not exit within {:?}, detaching it",
                self.join_timeout
            );
            false
        };

        *lock(&self.state) = WorkerState::Stopped;
        if exited {
            info!("playback worker stopped");
        }
        exited
    }
}

impl Drop for PlaybackWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
