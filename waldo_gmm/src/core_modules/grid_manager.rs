// THEORY:
// The `PixelMixtureGrid` is the central nervous system of the engine. It owns one
// `PixelMixture` per pixel location and orchestrates the flow of data from a frame's
// observations down to those mixtures, collecting their verdicts into a coherent,
// full-frame `BackgroundMask`.
//
// Key architectural principles:
// 1.  **Orchestration**: It is not an analyzer itself, but a manager. It holds the
//     master arena of mixtures, indexed row-major by `y * width + x`, and calls each
//     one's `update` exactly once per frame, in frame order.
// 2.  **Warm-up barrier**: For the first `warmup_frames` frames it only buffers
//     observations per location. When the window is full it seeds every mixture in
//     one pass and drops the buffers. No mixture exists before that, and no frame is
//     classified before every mixture exists.
// 3.  **Isolation**: No mixture ever reads another's state. A grid can therefore be
//     cut into row bands and each band run as its own grid (see `ParallelPipeline`).
// 4.  **Shape checking**: A frame with the wrong number of observations is rejected
//     before any state is touched.

use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::MixtureConfig;
use crate::core_modules::mask::BackgroundMask;
use crate::core_modules::mixture::PixelMixture;
use crate::core_modules::pixel::Pixel;
use crate::error::MixtureError;

/// Result of feeding one frame to the grid.
#[derive(Debug, Clone, PartialEq)]
pub enum GridStatus {
    /// Observations were buffered. When `buffered == required` the mixtures have just been built.
    WarmingUp { buffered: usize, required: usize },
    /// The frame was classified.
    Classified(BackgroundMask),
}

enum GridState {
    WarmingUp(Vec<Vec<Pixel>>),
    Running(Vec<PixelMixture>),
}

/// Owns the per-pixel mixtures for one image (or one band of an image).
pub struct PixelMixtureGrid {
    width: u32,
    height: u32,
    config: MixtureConfig,
    frames_buffered: usize,
    state: GridState,
    rng: StdRng,
}

impl PixelMixtureGrid {
    /// Creates a grid seeded from `config.seed`, or from entropy when no seed is set.
    pub fn new(width: u32, height: u32, config: MixtureConfig) -> Result<Self, MixtureError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(width, height, config, rng)
    }

    pub fn with_rng(
        width: u32,
        height: u32,
        config: MixtureConfig,
        rng: StdRng,
    ) -> Result<Self, MixtureError> {
        config.validate()?;
        if width == 0 || height == 0 {
            return Err(MixtureError::InvalidDimensions { width, height });
        }
        let pixel_count = width as usize * height as usize;
        let buffers = (0..pixel_count)
            .map(|_| Vec::with_capacity(config.warmup_frames))
            .collect();
        Ok(Self {
            width,
            height,
            config,
            frames_buffered: 0,
            state: GridState::WarmingUp(buffers),
            rng,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn config(&self) -> &MixtureConfig {
        &self.config
    }

    pub fn is_warmed_up(&self) -> bool {
        matches!(self.state, GridState::Running(_))
    }

    /// The row-major mixture arena, once warm-up has completed.
    pub fn mixtures(&self) -> Option<&[PixelMixture]> {
        match &self.state {
            GridState::Running(mixtures) => Some(mixtures),
            GridState::WarmingUp(_) => None,
        }
    }

    pub fn mixture_at(&self, x: u32, y: u32) -> Option<&PixelMixture> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.mixtures()
            .map(|mixtures| &mixtures[y as usize * self.width as usize + x as usize])
    }

    /// Feeds one frame of row-major observations.
    pub fn process_frame(&mut self, frame: &[Pixel]) -> Result<GridStatus, MixtureError> {
        let expected = self.pixel_count();
        if frame.len() != expected {
            return Err(MixtureError::FrameSizeMismatch {
                expected,
                found: frame.len(),
            });
        }

        match &mut self.state {
            GridState::WarmingUp(buffers) => {
                for (samples, pixel) in buffers.iter_mut().zip(frame) {
                    samples.push(*pixel);
                }
                self.frames_buffered += 1;

                let required = self.config.warmup_frames;
                if self.frames_buffered >= required {
                    let mixtures = buffers
                        .iter()
                        .map(|samples| PixelMixture::init(samples, &self.config, &mut self.rng))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.state = GridState::Running(mixtures);
                    info!(
                        "built {} pixel mixtures of {} components after {} warm-up frames",
                        expected, self.config.components, self.frames_buffered
                    );
                }

                Ok(GridStatus::WarmingUp {
                    buffered: self.frames_buffered,
                    required,
                })
            }
            GridState::Running(mixtures) => {
                let threshold = self.config.background_threshold;
                let flags = mixtures
                    .iter_mut()
                    .zip(frame)
                    .map(|(mixture, pixel)| mixture.update(pixel, threshold))
                    .collect();
                Ok(GridStatus::Classified(BackgroundMask::new(
                    self.width,
                    self.height,
                    flags,
                )))
            }
        }
    }
}
