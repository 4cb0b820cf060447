//! Top-level lifecycle: load configuration, hook the host, run the worker,
//! reconfigure and shut down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{error, info, warn};
use serde::Serialize;

use crate::cache::{CacheKey, CacheStats, ClipCache};
use crate::channel::RequestChannel;
use crate::config::{load_initial, reload_or_keep, ConfigSource, PlaybackConfig};
use crate::device::DeviceResolver;
use crate::error::Result;
use crate::hook::{InterceptionShim, ShimStats, ToneEntryPoint};
use crate::mapping::{map_frequency, FrequencyRange};
use crate::sink::{AudioBackend, StreamSettings};
use crate::tools::lock;
use crate::worker::{PlaybackWorker, WorkerSetup, WorkerState, WorkerStats};

/// Point-in-time view of the whole pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub enabled: bool,
    pub worker_state: WorkerState,
    pub device_index: Option<usize>,
    pub requests_published: u64,
    pub cache: CacheStats,
    pub worker: WorkerStats,
    pub hook: ShimStats,
}

/// Owns every piece of the pipeline and sequences their lifecycles.
pub struct ProgressEngine {
    source: Box<dyn ConfigSource>,
    backend: Arc<dyn AudioBackend>,
    resolver: Box<dyn DeviceResolver>,
    config: PlaybackConfig,
    device_index: Option<usize>,
    channel: Arc<RequestChannel>,
    cache: Arc<Mutex<ClipCache>>,
    enabled: Arc<AtomicBool>,
    worker: PlaybackWorker,
    shim: InterceptionShim,
    started: bool,
}

impl ProgressEngine {
    /// Load the initial configuration (falling back to defaults) and build
    /// an idle engine. Nothing is hooked or spawned until [`start`](Self::start).
    pub fn new<S, R>(source: S, backend: Arc<dyn AudioBackend>, resolver: R) -> Self
    where
        S: ConfigSource + 'static,
        R: DeviceResolver + 'static,
    {
        let config = load_initial(&source);
        let device_index = resolve_device(&resolver, &config);
        let channel = Arc::new(RequestChannel::new());
        let enabled = Arc::new(AtomicBool::new(true));
        let worker = PlaybackWorker::new();
        let shim = InterceptionShim::new(channel.clone(), enabled.clone(), worker.liveness());

        Self {
            source: Box::new(source),
            backend,
            resolver: Box::new(resolver),
            cache: Arc::new(Mutex::new(ClipCache::new(config.max_cache_entries))),
            config,
            device_index,
            channel,
            enabled,
            worker,
            shim,
            started: false,
        }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn device_index(&self) -> Option<usize> {
        self.device_index
    }

    pub fn shim(&self) -> &InterceptionShim {
        &self.shim
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Whether a worker thread is alive and able to take requests.
    pub fn is_worker_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Start the worker and hook `entry`. A hook failure disables the
    /// add-on, stops the worker and leaves the host untouched.
    pub fn start(&mut self, entry: Arc<dyn ToneEntryPoint>) -> Result<()> {
        self.started = true;
        self.spawn_worker();

        if let Err(err) = self.shim.install(entry) {
            error!("hook: {}; progress tones stay native", err);
            self.enabled.store(false, Ordering::SeqCst);
            self.worker.stop();
            self.started = false;
            return Err(err);
        }
        info!(
            "progress engine started: {} / {} fade, {:.0}-{:.0}Hz",
            self.config.waveform_type,
            self.config.fade_algorithm,
            self.config.target_min_freq,
            self.config.target_max_freq
        );
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!("progress tones {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Flip playback on or off without touching the worker. Returns the new
    /// state.
    pub fn toggle_enabled(&self) -> bool {
        let enabled = !self.enabled.fetch_xor(true, Ordering::SeqCst);
        info!("progress tones {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    /// Re-read the configuration source and rebuild the pipeline. An invalid
    /// record keeps the previous configuration. Returns whether the source's
    /// record was applied.
    pub fn reconfigure(&mut self) -> bool {
        let (config, fresh) = reload_or_keep(self.source.as_ref(), &self.config);
        self.apply(config);
        fresh
    }

    /// Point output at the device the host knows as `host_device_id`, or at
    /// the system default for `None`, and rebuild the pipeline.
    pub fn set_output_device(&mut self, host_device_id: Option<&str>) {
        let mut config = self.config.clone();
        config.output_device = host_device_id.map(str::to_string);
        self.apply(config);
    }

    /// Stop, clear, rebuild derived state and restart, strictly in sequence.
    fn apply(&mut self, config: PlaybackConfig) {
        let was_started = self.started;
        if !self.worker.stop() {
            warn!("config: previous worker detached during reconfiguration");
        }
        lock(&self.cache).reset(config.max_cache_entries);
        self.device_index = resolve_device(self.resolver.as_ref(), &config);
        self.config = config;
        info!(
            "config: applied {} / {} fade, volume {:.1}, {:.0}-{:.0}Hz, {:.0}ms clips",
            self.config.waveform_type,
            self.config.fade_algorithm,
            self.config.volume,
            self.config.target_min_freq,
            self.config.target_max_freq,
            self.config.clip_duration_secs * 1000.0
        );
        if was_started {
            self.spawn_worker();
        }
    }

    fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            sample_rate: self.config.sample_rate,
            channels: 1,
            frames_per_buffer: self.config.frames_per_buffer,
            device_index: self.device_index,
            exception_on_underflow: false,
        }
    }

    fn spawn_worker(&mut self) {
        let setup = WorkerSetup {
            channel: self.channel.clone(),
            cache: self.cache.clone(),
            enabled: self.enabled.clone(),
            backend: self.backend.clone(),
            settings: self.stream_settings(),
            config: self.config.clone(),
        };
        if let Err(err) = self.worker.start(setup) {
            error!("start: playback worker unavailable: {}", err);
        }
    }

    /// Frequency the worker would play for an observed host frequency.
    pub fn mapped_frequency(&self, observed: f64) -> f64 {
        map_frequency(
            observed,
            &FrequencyRange::NATIVE_SWEEP,
            &self.config.target_range(),
        )
    }

    /// Whether the clip for an observed host frequency is already cached.
    pub fn is_cached(&self, observed: f64) -> bool {
        let key = CacheKey::new(
            self.mapped_frequency(observed),
            self.config.volume,
            self.config.waveform_type,
        );
        lock(&self.cache).contains(&key)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            enabled: self.is_enabled(),
            worker_state: self.worker.state(),
            device_index: self.device_index,
            requests_published: self.channel.published(),
            cache: lock(&self.cache).stats(),
            worker: self.worker.stats(),
            hook: self.shim.stats(),
        }
    }

    /// Disable, stop the worker, drop cached clips and restore the host's
    /// tone function. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.started = false;
        self.worker.stop();
        lock(&self.cache).clear();
        if let Err(err) = self.shim.uninstall() {
            error!("hook: {}", err);
        }
    }
}

impl Drop for ProgressEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn resolve_device(resolver: &dyn DeviceResolver, config: &PlaybackConfig) -> Option<usize> {
    config
        .output_device
        .as_deref()
        .and_then(|id| resolver.resolve_device_index(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharedConfig;
    use crate::device::{DefaultDevice, ExactNameResolver};
    use crate::error::ProgressError;
    use crate::hook::{tone_fn, ToneFn, ToneSlot};
    use crate::sink::MemoryBackend;
    use crate::synth::Waveform;
    use std::sync::atomic::AtomicU32;
    use std::thread;
    use std::time::{Duration, Instant};

    struct Host {
        slot: Arc<ToneSlot>,
        native: ToneFn,
        native_calls: Arc<AtomicU32>,
    }

    fn host() -> Host {
        let native_calls = Arc::new(AtomicU32::new(0));
        let counter = native_calls.clone();
        let native = tone_fn(move |_, _, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        Host {
            slot: Arc::new(ToneSlot::new(native.clone())),
            native,
            native_calls,
        }
    }

    fn fast_config() -> PlaybackConfig {
        PlaybackConfig {
            target_min_freq: 200.0,
            target_max_freq: 1200.0,
            clip_duration_secs: 0.02,
            ..PlaybackConfig::default()
        }
    }

    fn engine(config: PlaybackConfig) -> (ProgressEngine, SharedConfig, MemoryBackend) {
        let source = SharedConfig::new(config);
        let backend = MemoryBackend::new();
        let engine = ProgressEngine::new(source.clone(), Arc::new(backend.clone()), DefaultDevice);
        (engine, source, backend)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn wait_for_worker(engine: &ProgressEngine) {
        wait_until(|| engine.is_worker_running());
    }

    #[test]
    fn midpoint_tone_plays_mapped_and_is_cached() {
        let host = host();
        let (mut engine, _, backend) = engine(fast_config());
        engine.start(host.slot.clone()).expect("start");
        wait_for_worker(&engine);

        assert!((engine.mapped_frequency(955.0) - 700.0).abs() < 1e-9);

        host.slot.beep(955.0, 40, 50, 50);
        wait_until(|| engine.stats().worker.played == 1);
        assert!(engine.is_cached(955.0));
        assert_eq!(engine.stats().cache.misses, 1);
        assert_eq!(engine.stats().cache.hits, 0);

        host.slot.beep(955.0, 40, 50, 50);
        wait_until(|| engine.stats().worker.played == 2);
        let stats = engine.stats();
        assert_eq!(stats.cache.hits, 1);
        assert_eq!(stats.cache.misses, 1);
        assert_eq!(backend.writes(), 2);
        assert_eq!(host.native_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn toggling_off_hands_tones_back_to_the_host() {
        let host = host();
        let (mut engine, _, backend) = engine(fast_config());
        engine.start(host.slot.clone()).expect("start");
        wait_for_worker(&engine);

        assert!(!engine.toggle_enabled());
        host.slot.beep(500.0, 40, 50, 50);
        assert_eq!(host.native_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.writes(), 0);
        assert_eq!(engine.worker_state(), WorkerState::Running);

        assert!(engine.toggle_enabled());
        host.slot.beep(500.0, 40, 50, 50);
        wait_until(|| engine.stats().worker.played == 1);
        assert_eq!(host.native_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reconfigure_applies_valid_records_and_keeps_previous_on_invalid() {
        let host = host();
        let (mut engine, source, backend) = engine(fast_config());
        engine.start(host.slot.clone()).expect("start");
        wait_for_worker(&engine);
        host.slot.beep(800.0, 40, 50, 50);
        wait_until(|| engine.stats().worker.played == 1);

        source.update(|config| config.waveform_type = Waveform::Square);
        assert!(engine.reconfigure());
        assert_eq!(engine.config().waveform_type, Waveform::Square);
        assert_eq!(engine.stats().cache.size, 0);
        wait_for_worker(&engine);
        wait_until(|| backend.opens() == 2);

        source.update(|config| {
            config.target_min_freq = 300.0;
            config.target_max_freq = 300.0;
        });
        assert!(!engine.reconfigure());
        assert_eq!(engine.config().target_min_freq, 200.0);
        assert_eq!(engine.config().waveform_type, Waveform::Square);
        wait_for_worker(&engine);
    }

    #[test]
    fn reconfigured_source_range_never_moves_the_mapping() {
        let host = host();
        let (mut engine, source, backend) = engine(fast_config());
        engine.start(host.slot.clone()).expect("start");
        wait_for_worker(&engine);

        source.update(|config| {
            config.source_min_freq = 200.0;
            config.source_max_freq = 1200.0;
        });
        assert!(!engine.reconfigure());
        assert_eq!(engine.config().source_min_freq, 110.0);
        assert!((engine.mapped_frequency(955.0) - 700.0).abs() < 1e-9);

        wait_for_worker(&engine);
        host.slot.beep(955.0, 40, 50, 50);
        wait_until(|| engine.stats().worker.played == 1);
        assert_eq!(backend.writes(), 1);
        assert!(engine.is_cached(955.0));
    }

    #[test]
    fn invalid_initial_record_falls_back_to_defaults() {
        let (engine, _, _) = engine(PlaybackConfig {
            volume: 2.0,
            ..fast_config()
        });
        assert_eq!(engine.config(), &PlaybackConfig::default());
    }

    #[test]
    fn output_device_is_resolved_by_exact_name() {
        let host = host();
        let backend = MemoryBackend::new();
        let mut engine = ProgressEngine::new(
            SharedConfig::new(fast_config()),
            Arc::new(backend.clone()),
            ExactNameResolver::with_names(vec!["Speakers".into(), "Headphones".into()]),
        );
        engine.start(host.slot.clone()).expect("start");
        wait_until(|| backend.opens() == 1);
        assert_eq!(backend.last_open().expect("open").device_index, None);

        engine.set_output_device(Some("Headphones"));
        assert_eq!(engine.device_index(), Some(1));
        wait_until(|| backend.opens() == 2);
        assert_eq!(backend.last_open().expect("open").device_index, Some(1));

        engine.set_output_device(Some("Unknown"));
        assert_eq!(engine.device_index(), None);
    }

    struct LockedEntryPoint;

    impl ToneEntryPoint for LockedEntryPoint {
        fn current(&self) -> Result<ToneFn> {
            Ok(tone_fn(|_, _, _, _| {}))
        }

        fn replace(&self, _tone: ToneFn) -> Result<()> {
            Err(ProgressError::Hook("entry point is read-only".into()))
        }
    }

    #[test]
    fn hook_failure_disables_the_add_on() {
        let (mut engine, _, _) = engine(fast_config());
        assert!(engine.start(Arc::new(LockedEntryPoint)).is_err());
        assert!(!engine.is_enabled());
        assert_eq!(engine.worker_state(), WorkerState::Stopped);
        assert!(!engine.stats().hook.installed);
    }

    #[test]
    fn shutdown_restores_the_host_and_is_repeatable() {
        let host = host();
        let (mut engine, _, backend) = engine(fast_config());
        engine.start(host.slot.clone()).expect("start");
        wait_for_worker(&engine);

        engine.shutdown();
        assert!(Arc::ptr_eq(&host.slot.get(), &host.native));
        assert_eq!(engine.worker_state(), WorkerState::Stopped);
        assert!(backend.closes() >= 1);
        engine.shutdown();

        host.slot.beep(500.0, 40, 50, 50);
        assert_eq!(host.native_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stats_serialize_to_json() {
        let (engine, _, _) = engine(fast_config());
        let json = serde_json::to_value(engine.stats()).expect("serialize stats");
        assert_eq!(json["worker_state"], "stopped");
        assert_eq!(json["cache"]["capacity"], 300);
        assert_eq!(json["enabled"], true);
    }
}
