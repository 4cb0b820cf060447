//! Playback configuration record and its validation rules.

mod source;

pub use source::{load_initial, reload_or_keep, ConfigSource, JsonConfigFile, SharedConfig};

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::error::{ProgressError, Result};
use crate::mapping::{FrequencyRange, NATIVE_SWEEP_MAX_HZ, NATIVE_SWEEP_MIN_HZ};
use crate::synth::{FadeAlgorithm, Waveform};

pub const DEFAULT_VOLUME: f64 = 0.4;
pub const DEFAULT_TARGET_MIN_HZ: f64 = 110.0;
pub const DEFAULT_TARGET_MAX_HZ: f64 = 1720.0;
pub const DEFAULT_CLIP_DURATION_SECS: f64 = 0.08;
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_FRAMES_PER_BUFFER: u32 = 128;

/// Extra wait added to the clip length between worker polls.
pub const POLL_SLACK_SECS: f64 = 0.04;

const OPTION_EPSILON: f64 = 1e-6;

/// Selectable volumes: 0.1 to 1.0 in steps of 0.1.
pub fn volume_options() -> Vec<f64> {
    (1..=10).map(|step| step as f64 / 10.0).collect()
}

/// The host sweeps a fixed band, so the source bounds have one legal value
/// each. They stay in the record so older settings files still load.
pub fn source_min_options() -> Vec<f64> {
    vec![NATIVE_SWEEP_MIN_HZ]
}

pub fn source_max_options() -> Vec<f64> {
    vec![NATIVE_SWEEP_MAX_HZ]
}

/// Selectable lower bounds of the output band: 110 to 300 Hz in 10 Hz steps.
pub fn target_min_options() -> Vec<f64> {
    (110..=300).step_by(10).map(f64::from).collect()
}

/// Selectable upper bounds of the output band: 1200 to 1750 Hz in 10 Hz steps.
pub fn target_max_options() -> Vec<f64> {
    (1200..=1750).step_by(10).map(f64::from).collect()
}

/// Selectable clip lengths: 20 to 200 ms in 10 ms steps.
pub fn clip_duration_options() -> Vec<f64> {
    (2..=20).map(|step| step as f64 / 100.0).collect()
}

fn is_option(value: f64, options: &[f64]) -> bool {
    options
        .iter()
        .any(|option| (option - value).abs() < OPTION_EPSILON)
}

/// Everything the synthesis pipeline needs, as persisted by the settings
/// store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub waveform_type: Waveform,
    pub fade_algorithm: FadeAlgorithm,
    pub volume: f64,
    pub source_min_freq: f64,
    pub source_max_freq: f64,
    pub target_min_freq: f64,
    pub target_max_freq: f64,
    pub clip_duration_secs: f64,
    pub max_cache_entries: usize,
    pub sample_rate: u32,
    pub frames_per_buffer: u32,
    /// Host identifier of the preferred output device; `None` is the
    /// system default.
    pub output_device: Option<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            waveform_type: Waveform::default(),
            fade_algorithm: FadeAlgorithm::default(),
            volume: DEFAULT_VOLUME,
            source_min_freq: NATIVE_SWEEP_MIN_HZ,
            source_max_freq: NATIVE_SWEEP_MAX_HZ,
            target_min_freq: DEFAULT_TARGET_MIN_HZ,
            target_max_freq: DEFAULT_TARGET_MAX_HZ,
            clip_duration_secs: DEFAULT_CLIP_DURATION_SECS,
            max_cache_entries: DEFAULT_MAX_ENTRIES,
            sample_rate: DEFAULT_SAMPLE_RATE,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
            output_device: None,
        }
    }
}

impl PlaybackConfig {
    pub fn target_range(&self) -> FrequencyRange {
        FrequencyRange {
            min: self.target_min_freq,
            max: self.target_max_freq,
        }
    }

    /// Time between worker polls: one clip plus a fixed slack, so a new clip
    /// never starts while the previous one is still being written.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.clip_duration_secs.max(0.0) + POLL_SLACK_SECS)
    }

    /// Check the record against the allowed option sets.
    pub fn validate(&self) -> Result<()> {
        if !is_option(self.volume, &volume_options()) {
            return Err(ProgressError::Config(format!(
                "volume {} is not one of 0.1..=1.0 in 0.1 steps",
                self.volume
            )));
        }
        if !is_option(self.source_min_freq, &source_min_options())
            || !is_option(self.source_max_freq, &source_max_options())
        {
            return Err(ProgressError::Config(format!(
                "source range {}..{}Hz must be the host sweep {}..{}Hz",
                self.source_min_freq,
                self.source_max_freq,
                NATIVE_SWEEP_MIN_HZ,
                NATIVE_SWEEP_MAX_HZ
            )));
        }
        self.target_range().validate()?;
        if !is_option(self.target_min_freq, &target_min_options()) {
            return Err(ProgressError::Config(format!(
                "target minimum {}Hz is not a selectable value",
                self.target_min_freq
            )));
        }
        if !is_option(self.target_max_freq, &target_max_options()) {
            return Err(ProgressError::Config(format!(
                "target maximum {}Hz is not a selectable value",
                self.target_max_freq
            )));
        }
        if !is_option(self.clip_duration_secs, &clip_duration_options()) {
            return Err(ProgressError::Config(format!(
                "clip duration {}s is not a selectable value",
                self.clip_duration_secs
            )));
        }
        if self.sample_rate == 0 {
            return Err(ProgressError::Config("sample rate must be positive".into()));
        }
        if self.frames_per_buffer == 0 {
            return Err(ProgressError::Config(
                "frames per buffer must be positive".into(),
            ));
        }
        if self.max_cache_entries == 0 {
            return Err(ProgressError::Config(
                "clip cache must hold at least one entry".into(),
            ));
        }
        Ok(())
    }
}
