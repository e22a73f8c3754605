// THEORY:
// Every failure the engine can report lives in one enum. The model itself is pure
// arithmetic, so nearly all of these are configuration or shape errors caught before
// a single mixture is touched. The remaining two (`WorkerUnavailable`, `BandDesync`)
// belong to the parallel pipeline, where a band actor can disappear underneath us.

use std::fmt;

/// Errors surfaced by the mixture engine.
#[derive(Debug, Clone, PartialEq)]
pub enum MixtureError {
    /// A mixture was requested with zero components.
    NoComponents,
    /// The warm-up window holds fewer samples than there are components to seed.
    TooFewSamples { samples: usize, components: usize },
    /// The learning rate is not in the open interval (0, 1).
    LearningRateOutOfRange { learning_rate: f64 },
    /// The background threshold is not in the open interval (0, 1).
    BackgroundThresholdOutOfRange { threshold: f64 },
    /// The variance floor is not positive, or the high variance sits below it.
    InvalidVarianceBounds { min_variance: f64, high_variance: f64 },
    /// The parallel pipeline was asked to run with zero workers.
    ZeroWorkers,
    /// The image has a zero dimension, or two images disagree on their dimensions.
    InvalidDimensions { width: u32, height: u32 },
    /// A frame did not carry exactly one observation per pixel location.
    FrameSizeMismatch { expected: usize, found: usize },
    /// A raw buffer used a channel count the pixel reader does not understand.
    UnsupportedChannelCount { channels: usize },
    /// A band worker has shut down or dropped its reply channel.
    WorkerUnavailable,
    /// Band workers disagreed on whether the warm-up window is complete.
    BandDesync,
}

impl fmt::Display for MixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoComponents => write!(f, "a mixture needs at least one component"),
            Self::TooFewSamples {
                samples,
                components,
            } => write!(
                f,
                "{samples} warm-up samples cannot seed {components} distinct components"
            ),
            Self::LearningRateOutOfRange { learning_rate } => {
                write!(f, "learning rate ({learning_rate}) must lie in (0, 1)")
            }
            Self::BackgroundThresholdOutOfRange { threshold } => {
                write!(f, "background threshold ({threshold}) must lie in (0, 1)")
            }
            Self::InvalidVarianceBounds {
                min_variance,
                high_variance,
            } => write!(
                f,
                "variance bounds are invalid: min {min_variance}, high {high_variance}"
            ),
            Self::ZeroWorkers => write!(f, "the parallel pipeline needs at least one worker"),
            Self::InvalidDimensions { width, height } => {
                write!(f, "invalid image dimensions {width}x{height}")
            }
            Self::FrameSizeMismatch { expected, found } => write!(
                f,
                "frame carries {found} observations, expected {expected}"
            ),
            Self::UnsupportedChannelCount { channels } => {
                write!(f, "cannot read pixels with {channels} channels")
            }
            Self::WorkerUnavailable => write!(f, "a band worker is no longer available"),
            Self::BandDesync => write!(f, "band workers disagree on the warm-up state"),
        }
    }
}

impl std::error::Error for MixtureError {}
