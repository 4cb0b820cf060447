//! Shared state captured when the worker thread is spawned.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize};
use std::sync::{Arc, Mutex};

use crate::cache::ClipCache;
use crate::channel::RequestChannel;
use crate::config::PlaybackConfig;
use crate::sink::{AudioBackend, StreamSettings};

use super::{WorkerCounters, WorkerState};

/// Everything one worker generation reads or updates. The configuration is a
/// snapshot; a reconfiguration stops this generation and starts a new one.
pub(super) struct WorkerContext {
    pub(super) channel: Arc<RequestChannel>,
    pub(super) cache: Arc<Mutex<ClipCache>>,
    pub(super) enabled: Arc<AtomicBool>,
    pub(super) abort: Arc<AtomicBool>,
    pub(super) live_threads: Arc<AtomicUsize>,
    pub(super) state: Arc<Mutex<WorkerState>>,
    pub(super) last_seen: Arc<AtomicU64>,
    pub(super) counters: Arc<WorkerCounters>,
    pub(super) backend: Arc<dyn AudioBackend>,
    pub(super) settings: StreamSettings,
    pub(super) config: PlaybackConfig,
}
