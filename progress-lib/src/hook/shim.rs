//! The handler installed over the host's tone function.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info};
use serde::Serialize;

use crate::channel::RequestChannel;
use crate::error::{ProgressError, Result};
use crate::tools::lock;
use crate::worker::WorkerLiveness;

use super::{ProgressToneFilter, ToneEntryPoint, ToneFn};

/// What happened to one intercepted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneDisposition {
    /// Handed to the playback worker under this request id.
    Published(u64),
    /// Passed unchanged to the host's original function.
    Forwarded,
    /// Not a progress tone and no original to forward to.
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShimStats {
    pub installed: bool,
    pub intercepted: u64,
    pub forwarded: u64,
}

struct ShimState {
    original: Mutex<Option<ToneFn>>,
    entry: Mutex<Option<Arc<dyn ToneEntryPoint>>>,
    channel: Arc<RequestChannel>,
    enabled: Arc<AtomicBool>,
    worker: WorkerLiveness,
    filter: ProgressToneFilter,
    intercepted: AtomicU64,
    forwarded: AtomicU64,
}

impl ShimState {
    /// O(1) and non-blocking apart from the channel's single-assignment lock.
    fn dispatch(
        &self,
        frequency: f64,
        length_ms: u32,
        left: u8,
        right: u8,
        forward: Option<&ToneFn>,
    ) -> ToneDisposition {
        if self.filter.is_progress_tone(frequency, length_ms, left, right)
            && self.enabled.load(Ordering::SeqCst)
            && self.worker.is_running()
        {
            let id = self.channel.publish(frequency);
            self.intercepted.fetch_add(1, Ordering::Relaxed);
            return ToneDisposition::Published(id);
        }

        match forward {
            Some(original) => {
                self.forwarded.fetch_add(1, Ordering::Relaxed);
                original(frequency, length_ms, left, right);
                ToneDisposition::Forwarded
            }
            None => {
                debug!(
                    "classify: {:.1}Hz/{}ms not intercepted and no original installed",
                    frequency, length_ms
                );
                ToneDisposition::Dropped
            }
        }
    }
}

/// Owns the saved host tone function; `install` and `uninstall` are the
/// only operations that swap the host entry point.
pub struct InterceptionShim {
    state: Arc<ShimState>,
}

impl InterceptionShim {
    pub fn new(
        channel: Arc<RequestChannel>,
        enabled: Arc<AtomicBool>,
        worker: WorkerLiveness,
    ) -> Self {
        Self::with_filter(ProgressToneFilter::default(), channel, enabled, worker)
    }

    pub fn with_filter(
        filter: ProgressToneFilter,
        channel: Arc<RequestChannel>,
        enabled: Arc<AtomicBool>,
        worker: WorkerLiveness,
    ) -> Self {
        Self {
            state: Arc::new(ShimState {
                original: Mutex::new(None),
                entry: Mutex::new(None),
                channel,
                enabled,
                worker,
                filter,
                intercepted: AtomicU64::new(0),
                forwarded: AtomicU64::new(0),
            }),
        }
    }

    pub fn filter(&self) -> ProgressToneFilter {
        self.state.filter
    }

    pub fn is_installed(&self) -> bool {
        lock(&self.state.original).is_some()
    }

    pub fn stats(&self) -> ShimStats {
        ShimStats {
            installed: self.is_installed(),
            intercepted: self.state.intercepted.load(Ordering::Relaxed),
            forwarded: self.state.forwarded.load(Ordering::Relaxed),
        }
    }

    /// Save the host's current tone function and install the handler over
    /// it. A second install before `uninstall` is a no-op.
    pub fn install(&self, entry: Arc<dyn ToneEntryPoint>) -> Result<()> {
        let mut original = lock(&self.state.original);
        if original.is_some() {
            debug!("hook: already installed");
            return Ok(());
        }

        let host_tone = entry
            .current()
            .map_err(|err| ProgressError::Hook(format!("read host tone function: {}", err)))?;

        // The handler must not keep the shim alive; once the shim is gone it
        // degrades to calling the saved original.
        let weak = Arc::downgrade(&self.state);
        let fallback = host_tone.clone();
        let handler: ToneFn = Arc::new(move |frequency: f64, length_ms: u32, left: u8, right: u8| {
            match weak.upgrade() {
                Some(state) => {
                    state.dispatch(frequency, length_ms, left, right, Some(&fallback));
                }
                None => fallback(frequency, length_ms, left, right),
            }
        });

        entry
            .replace(handler)
            .map_err(|err| ProgressError::Hook(format!("install handler: {}", err)))?;

        *original = Some(host_tone);
        *lock(&self.state.entry) = Some(entry);
        info!("hook: installed over the host tone function");
        Ok(())
    }

    /// Restore the saved original. A no-op when nothing is installed.
    ///
    /// If the host refuses the restore, playback is disabled so the still
    /// installed handler forwards every call.
    pub fn uninstall(&self) -> Result<()> {
        let mut original = lock(&self.state.original);
        let Some(host_tone) = original.take() else {
            return Ok(());
        };
        let mut entry_slot = lock(&self.state.entry);
        if let Some(entry) = entry_slot.take() {
            if let Err(err) = entry.replace(host_tone.clone()) {
                self.state.enabled.store(false, Ordering::SeqCst);
                *original = Some(host_tone);
                *entry_slot = Some(entry);
                error!("hook: restoring the host tone function failed: {}", err);
                return Err(ProgressError::Hook(format!("restore host tone function: {}", err)));
            }
        }
        info!("hook: host tone function restored");
        Ok(())
    }

    /// Classify one tone call and either publish it to the worker or forward
    /// it to the saved original.
    pub fn handle(&self, frequency: f64, length_ms: u32, left: u8, right: u8) -> ToneDisposition {
        let original = lock(&self.state.original).clone();
        self.state
            .dispatch(frequency, length_ms, left, right, original.as_ref())
    }
}

impl Drop for InterceptionShim {
    fn drop(&mut self) {
        if let Err(err) = self.uninstall() {
            error!("hook: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::{tone_fn, ToneSlot};
    use std::sync::atomic::AtomicU32;

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

    fn shim(enabled: bool, running: bool) -> (InterceptionShim, Arc<RequestChannel>) {
        let channel = Arc::new(RequestChannel::new());
        let liveness = if running {
            WorkerLiveness::always_running()
        } else {
            WorkerLiveness::default()
        };
        let enabled = Arc::new(AtomicBool::new(enabled));
        let shim = InterceptionShim::new(channel.clone(), enabled, liveness);
        (shim, channel)
    }

    #[test]
    fn progress_tone_is_published_and_suppressed() {
        let host = host();
        let (shim, channel) = shim(true, true);
        shim.install(host.slot.clone()).expect("install");

        host.slot.beep(500.0, 40, 50, 50);
        assert_eq!(host.native_calls.load(Ordering::SeqCst), 0);
        let request = channel.try_take_if_new(0).expect("published");
        assert_eq!(request.frequency, 500.0);
        assert_eq!(shim.stats().intercepted, 1);
    }

    #[test]
    fn other_tones_reach_the_original() {
        let host = host();
        let (shim, channel) = shim(true, true);
        shim.install(host.slot.clone()).expect("install");

        host.slot.beep(500.0, 40, 30, 70);
        host.slot.beep(2000.0, 40, 50, 50);
        assert_eq!(host.native_calls.load(Ordering::SeqCst), 2);
        assert_eq!(channel.published(), 0);
        assert_eq!(shim.stats().forwarded, 2);
    }

    #[test]
    fn disabled_or_idle_worker_forwards_progress_tones() {
        let host = host();
        let (disabled, _) = shim(false, true);
        assert_eq!(disabled.handle(500.0, 40, 50, 50), ToneDisposition::Dropped);

        disabled.install(host.slot.clone()).expect("install");
        assert_eq!(disabled.handle(500.0, 40, 50, 50), ToneDisposition::Forwarded);
        disabled.uninstall().expect("uninstall");

        let (idle, channel) = shim(true, false);
        idle.install(host.slot.clone()).expect("install");
        host.slot.beep(500.0, 40, 50, 50);
        assert_eq!(channel.published(), 0);
        assert_eq!(host.native_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handle_reports_the_request_id() {
        let host = host();
        let (shim, channel) = shim(true, true);
        shim.install(host.slot.clone()).expect("install");
        assert_eq!(shim.handle(700.0, 40, 50, 50), ToneDisposition::Published(1));
        assert_eq!(shim.handle(710.0, 41, 50, 50), ToneDisposition::Published(2));
        assert_eq!(channel.latest_id(), 2);
    }

    #[test]
    fn uninstall_restores_the_exact_original() {
        let host = host();
        let (shim, _) = shim(true, true);
        shim.install(host.slot.clone()).expect("install");
        assert!(!Arc::ptr_eq(&host.slot.get(), &host.native));

        shim.uninstall().expect("uninstall");
        assert!(Arc::ptr_eq(&host.slot.get(), &host.native));
        assert!(!shim.is_installed());
    }

    #[test]
    fn repeated_install_and_uninstall_are_idempotent() {
        let host = host();
        let (shim, _) = shim(true, true);
        shim.install(host.slot.clone()).expect("first install");
        shim.install(host.slot.clone()).expect("second install");

        shim.uninstall().expect("first uninstall");
        assert!(Arc::ptr_eq(&host.slot.get(), &host.native));
        shim.uninstall().expect("second uninstall");
        assert!(Arc::ptr_eq(&host.slot.get(), &host.native));
    }

    #[test]
    fn dropping_the_shim_restores_the_host() {
        let host = host();
        {
            let (shim, _) = shim(true, true);
            shim.install(host.slot.clone()).expect("install");
        }
        assert!(Arc::ptr_eq(&host.slot.get(), &host.native));
        host.slot.beep(500.0, 40, 50, 50);
        assert_eq!(host.native_calls.load(Ordering::SeqCst), 1);
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
    fn install_failure_leaves_the_shim_uninstalled() {
        let (shim, _) = shim(true, true);
        let result = shim.install(Arc::new(LockedEntryPoint));
        assert!(matches!(result, Err(ProgressError::Hook(_))));
        assert!(!shim.is_installed());
        shim.uninstall().expect("uninstall of nothing");
    }
}
