//! A stand-in for the screen reader: owns the global tone slot and beeps the
//! way the real host does.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::info;
use progress_lib::hook::{tone_fn, ToneSlot, CENTER_PAN};

/// Pitch of the 0% beep; the host doubles it every 25%.
pub const PROGRESS_BASE_HZ: f64 = 110.0;
pub const PROGRESS_TONE_MS: u32 = 40;

/// A tone the host plays for something other than progress.
const NOTIFY_HZ: f64 = 880.0;
const NOTIFY_MS: u32 = 100;

pub struct SimulatedHost {
    slot: Arc<ToneSlot>,
    native_beeps: Arc<AtomicU64>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        let native_beeps = Arc::new(AtomicU64::new(0));
        let counter = native_beeps.clone();
        let native = tone_fn(move |frequency, length_ms, left, right| {
            counter.fetch_add(1, Ordering::Relaxed);
            info!(
                "host: native beep {:.1}Hz for {}ms (pan {}/{})",
                frequency, length_ms, left, right
            );
        });
        Self {
            slot: Arc::new(ToneSlot::new(native)),
            native_beeps,
        }
    }

    pub fn slot(&self) -> Arc<ToneSlot> {
        self.slot.clone()
    }

    /// Calls that reached the host's own tone function.
    pub fn native_beeps(&self) -> u64 {
        self.native_beeps.load(Ordering::Relaxed)
    }

    pub fn progress_frequency(percent: f64) -> f64 {
        PROGRESS_BASE_HZ * 2f64.powf(percent.clamp(0.0, 100.0) / 25.0)
    }

    /// Beep for a progress bar at `percent`.
    pub fn progress_tone(&self, percent: f64) {
        self.slot.beep(
            Self::progress_frequency(percent),
            PROGRESS_TONE_MS,
            CENTER_PAN,
            CENTER_PAN,
        );
    }

    /// A notification beep that must never be intercepted.
    pub fn notify_tone(&self) {
        self.slot.beep(NOTIFY_HZ, NOTIFY_MS, CENTER_PAN, CENTER_PAN);
    }
}
