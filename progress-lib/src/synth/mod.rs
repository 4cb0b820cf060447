//! Clip synthesis.
//!
//! A clip is one short mono burst of 16-bit PCM at a single pitch. Synthesis
//! is a pure computation: oscillator value, times envelope gain, times the
//! output ceiling and volume, rounded and clamped to `i16`.

mod fade;
mod waveform;

pub use fade::{FadeAlgorithm, COSINE_FADE_RATIO, GAUSSIAN_FADE_RATIO, GAUSSIAN_SIGMA_RATIO};
pub use waveform::{Waveform, NOISE_MODULATION_DEPTH, PULSE_DUTY_CYCLE};

use rand::Rng;

use crate::error::{ProgressError, Result};

/// Peak amplitude of a full-volume clip. Kept below `i16::MAX` for headroom.
pub const MAX_AMPLITUDE: f64 = 30_000.0;

/// Sample buffers handed to the sink are padded to this many bytes.
pub const BUFFER_ALIGNMENT_BYTES: usize = 4;

const BYTES_PER_SAMPLE: usize = 2;

/// Parameters for one clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipParams {
    pub frequency: f64,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub volume: f64,
    pub waveform: Waveform,
    pub fade: FadeAlgorithm,
}

impl ClipParams {
    fn validate(&self) -> Result<usize> {
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(ProgressError::Synthesis(format!(
                "frequency must be positive, got {}",
                self.frequency
            )));
        }
        if !(self.duration_secs.is_finite() && self.duration_secs > 0.0) {
            return Err(ProgressError::Synthesis(format!(
                "duration must be positive, got {}",
                self.duration_secs
            )));
        }
        if self.sample_rate == 0 {
            return Err(ProgressError::Synthesis("sample rate must be positive".into()));
        }
        if !(self.volume > 0.0 && self.volume <= 1.0) {
            return Err(ProgressError::Synthesis(format!(
                "volume must be in (0, 1], got {}",
                self.volume
            )));
        }

        let samples = (self.sample_rate as f64 * self.duration_secs).round() as usize;
        if samples == 0 {
            return Err(ProgressError::Synthesis(format!(
                "{}s at {}Hz yields no samples",
                self.duration_secs, self.sample_rate
            )));
        }
        Ok(samples)
    }
}

/// Immutable mono 16-bit clip, already padded for the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    samples: Vec<i16>,
}

impl AudioClip {
    /// Wrap raw samples, padding with silence to the buffer alignment.
    pub fn from_samples(mut samples: Vec<i16>) -> Self {
        let per_block = BUFFER_ALIGNMENT_BYTES / BYTES_PER_SAMPLE;
        let remainder = samples.len() % per_block;
        if remainder != 0 {
            samples.resize(samples.len() + per_block - remainder, 0);
        }
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of mono frames, padding included.
    pub fn frame_count(&self) -> usize {
        self.samples.len()
    }

    /// Little-endian PCM bytes as written to the sink.
    pub fn pcm_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * BYTES_PER_SAMPLE);
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}

/// Synthesize a clip using the thread-local RNG for noise.
pub fn synthesize(params: &ClipParams) -> Result<AudioClip> {
    synthesize_with_rng(params, &mut rand::thread_rng())
}

/// Synthesize a clip with an explicit RNG (only white noise draws from it).
pub fn synthesize_with_rng<R: Rng + ?Sized>(params: &ClipParams, rng: &mut R) -> Result<AudioClip> {
    let total = params.validate()?;
    let sample_rate = params.sample_rate as f64;
    let scale = MAX_AMPLITUDE * params.volume;

    let mut samples = Vec::with_capacity(total + 1);
    for i in 0..total {
        let t = i as f64 / sample_rate;
        let raw = params.waveform.sample(params.frequency, t, rng);
        let value = raw * params.fade.gain(i, total);
        samples.push(quantize(value * scale));
    }

    Ok(AudioClip::from_samples(samples))
}

fn quantize(value: f64) -> i16 {
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}
