//! Per-waveform oscillators.

use std::f64::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fraction of each period a pulse wave spends high.
pub const PULSE_DUTY_CYCLE: f64 = 0.25;
/// Depth of the slow amplitude modulation applied to white noise.
pub const NOISE_MODULATION_DEPTH: f64 = 0.3;
/// White noise is modulated at `frequency / NOISE_MODULATION_DIVISOR` Hz.
pub const NOISE_MODULATION_DIVISOR: f64 = 1000.0;

/// Shape of the synthesized tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Triangle,
    Sawtooth,
    Pulse,
    WhiteNoise,
}

impl Waveform {
    pub const ALL: [Waveform; 6] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Triangle,
        Waveform::Sawtooth,
        Waveform::Pulse,
        Waveform::WhiteNoise,
    ];

    /// Stable lowercase name, matching the serialized form.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Square => "square",
            Self::Triangle => "triangle",
            Self::Sawtooth => "sawtooth",
            Self::Pulse => "pulse",
            Self::WhiteNoise => "white_noise",
        }
    }

    /// Raw oscillator value in `[-1, 1]` at time `t` seconds.
    pub(crate) fn sample<R: Rng + ?Sized>(&self, frequency: f64, t: f64, rng: &mut R) -> f64 {
        let phase = (frequency * t).fract();
        let value = match self {
            Self::Sine => (TAU * frequency * t).sin(),
            Self::Square => {
                if (TAU * frequency * t).sin() >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
            Self::Sawtooth => 2.0 * phase - 1.0,
            Self::Pulse => {
                if phase < PULSE_DUTY_CYCLE {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::WhiteNoise => {
                let noise: f64 = rng.gen_range(-1.0..=1.0);
                let rate = frequency / NOISE_MODULATION_DIVISOR;
                noise * (1.0 + NOISE_MODULATION_DEPTH * (TAU * rate * t).sin())
            }
        };
        value.clamp(-1.0, 1.0)
    }
}

impl std::fmt::Display for Waveform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Waveform {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|waveform| waveform.name() == normalized)
            .ok_or_else(|| format!("unknown waveform '{}'", value))
    }
}
