// THEORY:
// `MixtureConfig` is fixed for the lifetime of a run and shared by every pixel. It is
// validated once, at the edge (grid or pipeline construction), so the per-pixel hot
// path never re-checks it. `MixtureParams` is the small `Copy` slice of it that each
// `PixelMixture` carries around: the learning rate and the variance bounds.

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::error::MixtureError;

pub const DEFAULT_COMPONENTS: usize = 7;
pub const DEFAULT_LEARNING_RATE: f64 = 0.003;
pub const DEFAULT_BACKGROUND_THRESHOLD: f64 = 0.75;
pub const DEFAULT_MIN_VARIANCE: f64 = 8.0;
pub const DEFAULT_HIGH_VARIANCE: f64 = 36.0;
pub const DEFAULT_WARMUP_FRAMES: usize = 10;

/// Variance is capped at this multiple of the high variance.
pub const MAX_VARIANCE_FACTOR: f64 = 5.0;

/// How a freshly seeded component estimates its variance from the warm-up buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum InitVariance {
    /// Average of the signed per-channel differences between each sample and the
    /// gray level of the seeded mean. Not a true variance; mostly lands on the floor.
    #[default]
    Reference,
    /// Average squared distance to the seeded mean, divided across the three channels.
    Squared,
}

/// Per-mixture constants: learning rate and variance bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixtureParams {
    pub learning_rate: f64,
    pub min_variance: f64,
    pub high_variance: f64,
}

impl MixtureParams {
    /// The learning rate a bare mixture used before the driver overrode it.
    pub const REFERENCE_LEARNING_RATE: f64 = 0.001;

    pub fn max_variance(&self) -> f64 {
        MAX_VARIANCE_FACTOR * self.high_variance
    }

    /// Clamps into `[min_variance, max_variance]`. NaN lands on the floor.
    pub fn clamp_variance(&self, variance: f64) -> f64 {
        variance.max(self.min_variance).min(self.max_variance())
    }
}

impl Default for MixtureParams {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            min_variance: DEFAULT_MIN_VARIANCE,
            high_variance: DEFAULT_HIGH_VARIANCE,
        }
    }
}

/// Configuration for a background-subtraction run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(default, rename_all = "snake_case"))]
pub struct MixtureConfig {
    /// Number of Gaussian components per pixel (K).
    pub components: usize,
    /// How fast matched components absorb new observations.
    pub learning_rate: f64,
    /// Fraction of total weight treated as background.
    pub background_threshold: f64,
    pub min_variance: f64,
    /// Variance given to components born from an unmatched observation.
    pub high_variance: f64,
    /// Number of leading frames buffered to seed the mixtures.
    pub warmup_frames: usize,
    pub init_variance: InitVariance,
    /// Seed for mean selection during warm-up. `None` draws from entropy.
    pub seed: Option<u64>,
    /// Band workers for the parallel pipeline. `None` uses one per CPU.
    pub workers: Option<usize>,
}

impl Default for MixtureConfig {
    fn default() -> Self {
        Self {
            components: DEFAULT_COMPONENTS,
            learning_rate: DEFAULT_LEARNING_RATE,
            background_threshold: DEFAULT_BACKGROUND_THRESHOLD,
            min_variance: DEFAULT_MIN_VARIANCE,
            high_variance: DEFAULT_HIGH_VARIANCE,
            warmup_frames: DEFAULT_WARMUP_FRAMES,
            init_variance: InitVariance::default(),
            seed: None,
            workers: None,
        }
    }
}

impl MixtureConfig {
    pub fn params(&self) -> MixtureParams {
        MixtureParams {
            learning_rate: self.learning_rate,
            min_variance: self.min_variance,
            high_variance: self.high_variance,
        }
    }

    pub fn validate(&self) -> Result<(), MixtureError> {
        if self.components == 0 {
            return Err(MixtureError::NoComponents);
        }
        if self.warmup_frames < self.components {
            return Err(MixtureError::TooFewSamples {
                samples: self.warmup_frames,
                components: self.components,
            });
        }
        if !(self.learning_rate > 0.0 && self.learning_rate < 1.0) {
            return Err(MixtureError::LearningRateOutOfRange {
                learning_rate: self.learning_rate,
            });
        }
        if !(self.background_threshold > 0.0 && self.background_threshold < 1.0) {
            return Err(MixtureError::BackgroundThresholdOutOfRange {
                threshold: self.background_threshold,
            });
        }
        let bounds_ok = self.min_variance > 0.0
            && self.min_variance.is_finite()
            && self.high_variance.is_finite()
            && self.high_variance >= self.min_variance;
        if !bounds_ok {
            return Err(MixtureError::InvalidVarianceBounds {
                min_variance: self.min_variance,
                high_variance: self.high_variance,
            });
        }
        if self.workers == Some(0) {
            return Err(MixtureError::ZeroWorkers);
        }
        Ok(())
    }
}
