//! Remapping of host progress-tone pitches onto a user-chosen band.

use serde::{Deserialize, Serialize};

use crate::error::{ProgressError, Result};

/// Lowest pitch of the host's native progress sweep (Hz).
pub const NATIVE_SWEEP_MIN_HZ: f64 = 110.0;
/// Highest pitch of the host's native progress sweep (Hz).
pub const NATIVE_SWEEP_MAX_HZ: f64 = 1800.0;

/// Closed frequency interval in Hz with `min < max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub min: f64,
    pub max: f64,
}

impl FrequencyRange {
    /// The band the host sweeps while reporting progress.
    pub const NATIVE_SWEEP: FrequencyRange = FrequencyRange {
        min: NATIVE_SWEEP_MIN_HZ,
        max: NATIVE_SWEEP_MAX_HZ,
    };

    /// Build a range, rejecting empty, inverted or non-finite bounds.
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite()) {
            return Err(ProgressError::Config(format!(
                "frequency range {}..{} is not finite",
                self.min, self.max
            )));
        }
        if self.min >= self.max {
            return Err(ProgressError::Config(format!(
                "frequency range minimum {} must be below maximum {}",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Position of `frequency` inside the range, clamped to `[0, 1]`.
    pub fn progress_of(&self, frequency: f64) -> f64 {
        ((frequency - self.min) / self.span()).clamp(0.0, 1.0)
    }

    /// Frequency at `progress` (`0.0..=1.0`) inside the range.
    pub fn at_progress(&self, progress: f64) -> f64 {
        self.min + progress.clamp(0.0, 1.0) * self.span()
    }
}

/// Map an observed host frequency from `source` onto `target`.
///
/// `source` should be the host's fixed sweep ([`FrequencyRange::NATIVE_SWEEP`]),
/// not a previously configured output band, so that narrowing or widening
/// the target never compounds.
pub fn map_frequency(observed: f64, source: &FrequencyRange, target: &FrequencyRange) -> f64 {
    target.at_progress(source.progress_of(observed))
}
