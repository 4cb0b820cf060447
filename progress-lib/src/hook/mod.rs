//! Interception of the host's global tone function.
//!
//! The host exposes one process-wide tone entry point. [`ToneEntryPoint`]
//! abstracts reading and swapping it; [`ToneSlot`] is the in-process
//! implementation used by embedders and the simulator. The
//! [`InterceptionShim`] owns the saved original and is the only thing that
//! swaps the entry point.

mod classify;
mod shim;

pub use classify::{
    ProgressToneFilter, ToneClass, CENTER_PAN, PROGRESS_TONE_MAX_MS, PROGRESS_TONE_MIN_MS,
};
pub use shim::{InterceptionShim, ShimStats, ToneDisposition};

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;

/// Host tone callable: `(frequency_hz, length_ms, left_pan, right_pan)`.
pub type ToneFn = Arc<dyn Fn(f64, u32, u8, u8) + Send + Sync>;

/// Wrap a closure as a [`ToneFn`].
pub fn tone_fn<F>(tone: F) -> ToneFn
where
    F: Fn(f64, u32, u8, u8) + Send + Sync + 'static,
{
    Arc::new(tone)
}

/// Seam to the host's swappable tone function.
pub trait ToneEntryPoint: Send + Sync {
    /// The callable currently installed.
    fn current(&self) -> Result<ToneFn>;

    /// Install `tone` in place of the current callable.
    fn replace(&self, tone: ToneFn) -> Result<()>;
}

/// A swappable tone function, safe to call from any thread.
pub struct ToneSlot {
    tone: RwLock<ToneFn>,
}

impl ToneSlot {
    pub fn new(tone: ToneFn) -> Self {
        Self {
            tone: RwLock::new(tone),
        }
    }

    /// The callable currently installed.
    pub fn get(&self) -> ToneFn {
        self.tone
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in `tone`, returning the previous callable.
    pub fn set(&self, tone: ToneFn) -> ToneFn {
        let mut slot = self.tone.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, tone)
    }

    /// Call whatever is installed. The lock is not held during the call, so
    /// the callable may itself swap the slot.
    pub fn beep(&self, frequency: f64, length_ms: u32, left: u8, right: u8) {
        let tone = self.get();
        tone(frequency, length_ms, left, right);
    }
}

impl std::fmt::Debug for ToneSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToneSlot").finish_non_exhaustive()
    }
}

impl ToneEntryPoint for ToneSlot {
    fn current(&self) -> Result<ToneFn> {
        Ok(self.get())
    }

    fn replace(&self, tone: ToneFn) -> Result<()> {
        self.set(tone);
        Ok(())
    }
}
