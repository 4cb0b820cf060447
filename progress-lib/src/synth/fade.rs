//! Amplitude envelopes applied to every clip.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Portion of the clip ramped at each edge by the raised-cosine fade.
pub const COSINE_FADE_RATIO: f64 = 0.45;
/// Edge ratio associated with the gaussian fade. The gaussian envelope spans
/// the whole clip, so this only matters to callers that inspect the ratio.
pub const GAUSSIAN_FADE_RATIO: f64 = 0.3;
/// Standard deviation of the gaussian envelope as a fraction of the clip.
pub const GAUSSIAN_SIGMA_RATIO: f64 = 0.25;

/// Envelope used to soften clip edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeAlgorithm {
    #[default]
    Cosine,
    Gaussian,
}

impl FadeAlgorithm {
    pub const ALL: [FadeAlgorithm; 2] = [FadeAlgorithm::Cosine, FadeAlgorithm::Gaussian];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Gaussian => "gaussian",
        }
    }

    pub fn fade_ratio(&self) -> f64 {
        match self {
            Self::Cosine => COSINE_FADE_RATIO,
            Self::Gaussian => GAUSSIAN_FADE_RATIO,
        }
    }

    /// Envelope gain for sample `index` of a clip `total` samples long.
    pub(crate) fn gain(&self, index: usize, total: usize) -> f64 {
        match self {
            Self::Cosine => cosine_gain(index, total, self.fade_ratio()),
            Self::Gaussian => gaussian_gain(index, total),
        }
    }
}

impl std::fmt::Display for FadeAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for FadeAlgorithm {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "gaussian" => Ok(Self::Gaussian),
            _ => Err(format!("unknown fade algorithm '{}'", value)),
        }
    }
}

fn cosine_gain(index: usize, total: usize, ratio: f64) -> f64 {
    let fade_samples = (total as f64 * ratio) as usize;
    if fade_samples == 0 {
        return 1.0;
    }

    if index < fade_samples {
        (1.0 - (PI * index as f64 / fade_samples as f64).cos()) / 2.0
    } else if index >= total.saturating_sub(fade_samples) {
        let from_end = total.saturating_sub(index + 1);
        (1.0 - (PI * from_end as f64 / fade_samples as f64).cos()) / 2.0
    } else {
        1.0
    }
}

fn gaussian_gain(index: usize, total: usize) -> f64 {
    let sigma = total as f64 * GAUSSIAN_SIGMA_RATIO;
    if sigma <= 0.0 {
        return 1.0;
    }
    let center = total as f64 / 2.0;
    let x = (index as f64 - center) / sigma;
    (-0.5 * x * x).exp()
}
