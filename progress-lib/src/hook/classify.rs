//! Recognizes the host's progress-bar beeps among all the tones it plays.

use crate::mapping::{NATIVE_SWEEP_MAX_HZ, NATIVE_SWEEP_MIN_HZ};

/// The host plays its progress beeps for 40 ms; allow a little jitter.
pub const PROGRESS_TONE_MIN_MS: u32 = 38;
pub const PROGRESS_TONE_MAX_MS: u32 = 42;
/// Progress beeps are always centered.
pub const CENTER_PAN: u8 = 50;

/// Outcome of classifying one tone call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneClass {
    Progress,
    Passthrough,
}

impl ToneClass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Passthrough => "passthrough",
        }
    }
}

impl std::fmt::Display for ToneClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Narrow signature match: band, duration window and exact center pan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressToneFilter {
    pub min_hz: f64,
    pub max_hz: f64,
    pub min_length_ms: u32,
    pub max_length_ms: u32,
    pub pan: u8,
}

impl Default for ProgressToneFilter {
    fn default() -> Self {
        Self {
            min_hz: NATIVE_SWEEP_MIN_HZ,
            max_hz: NATIVE_SWEEP_MAX_HZ,
            min_length_ms: PROGRESS_TONE_MIN_MS,
            max_length_ms: PROGRESS_TONE_MAX_MS,
            pan: CENTER_PAN,
        }
    }
}

impl ProgressToneFilter {
    pub fn is_progress_tone(&self, frequency: f64, length_ms: u32, left: u8, right: u8) -> bool {
        frequency >= self.min_hz
            && frequency <= self.max_hz
            && length_ms >= self.min_length_ms
            && length_ms <= self.max_length_ms
            && left == self.pan
            && right == self.pan
    }

    pub fn classify(&self, frequency: f64, length_ms: u32, left: u8, right: u8) -> ToneClass {
        if self.is_progress_tone(frequency, length_ms, left, right) {
            ToneClass::Progress
        } else {
            ToneClass::Passthrough
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_in_band_beep_is_progress() {
        let filter = ProgressToneFilter::default();
        assert_eq!(filter.classify(500.0, 40, 50, 50), ToneClass::Progress);
        assert_eq!(filter.classify(110.0, 38, 50, 50), ToneClass::Progress);
        assert_eq!(filter.classify(1800.0, 42, 50, 50), ToneClass::Progress);
    }

    #[test]
    fn asymmetric_pan_passes_through() {
        let filter = ProgressToneFilter::default();
        assert_eq!(filter.classify(500.0, 40, 30, 70), ToneClass::Passthrough);
        assert_eq!(filter.classify(500.0, 40, 50, 49), ToneClass::Passthrough);
    }

    #[test]
    fn out_of_band_or_wrong_length_passes_through() {
        let filter = ProgressToneFilter::default();
        assert_eq!(filter.classify(2000.0, 40, 50, 50), ToneClass::Passthrough);
        assert_eq!(filter.classify(109.9, 40, 50, 50), ToneClass::Passthrough);
        assert_eq!(filter.classify(500.0, 37, 50, 50), ToneClass::Passthrough);
        assert_eq!(filter.classify(500.0, 100, 50, 50), ToneClass::Passthrough);
        assert_eq!(filter.classify(f64::NAN, 40, 50, 50), ToneClass::Passthrough);
    }

    #[test]
    fn class_names() {
        assert_eq!(ToneClass::Progress.to_string(), "progress");
        assert_eq!(ToneClass::Passthrough.to_string(), "passthrough");
    }
}
