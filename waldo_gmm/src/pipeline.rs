// THEORY:
// The `pipeline` module is the top-level, single-threaded API for the engine. It wraps
// a `PixelMixtureGrid` behind an interface that speaks in frames: raw byte buffers of a
// declared layout, `image` buffers, or ready-made pixel slices. Each call returns a
// `Report` saying either that the engine is still calibrating (warm-up) or what the
// frame's background mask is.

use image::RgbImage;
use log::debug;

use crate::config::MixtureConfig;
use crate::core_modules::grid_manager::{GridStatus, PixelMixtureGrid};
use crate::core_modules::pixel::{Pixel, PixelLayout, pixels_from_buffer, pixels_from_image};
use crate::error::MixtureError;

pub use crate::core_modules::mask::BackgroundMask;

/// The classified result for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    /// Zero-based index of the frame in the stream, warm-up frames included.
    pub frame_index: u64,
    pub mask: BackgroundMask,
    pub foreground_fraction: f64,
}

/// The output of a pipeline for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// The warm-up window is still filling.
    Calibrating {
        frames_buffered: usize,
        frames_required: usize,
    },
    Classified(FrameAnalysis),
}

impl Report {
    pub fn mask(&self) -> Option<&BackgroundMask> {
        match self {
            Report::Classified(analysis) => Some(&analysis.mask),
            Report::Calibrating { .. } => None,
        }
    }

    pub(crate) fn from_status(frame_index: u64, status: GridStatus) -> Self {
        match status {
            GridStatus::WarmingUp { buffered, required } => Report::Calibrating {
                frames_buffered: buffered,
                frames_required: required,
            },
            GridStatus::Classified(mask) => Report::Classified(FrameAnalysis {
                frame_index,
                foreground_fraction: mask.foreground_fraction(),
                mask,
            }),
        }
    }
}

/// Single-threaded background subtraction over a frame stream.
pub struct VisionPipeline {
    grid: PixelMixtureGrid,
    frames_processed: u64,
}

impl VisionPipeline {
    pub fn new(image_width: u32, image_height: u32, config: MixtureConfig) -> Result<Self, MixtureError> {
        Ok(Self {
            grid: PixelMixtureGrid::new(image_width, image_height, config)?,
            frames_processed: 0,
        })
    }

    pub fn process_pixels(&mut self, frame: &[Pixel]) -> Result<Report, MixtureError> {
        let status = self.grid.process_frame(frame)?;
        let frame_index = self.frames_processed;
        self.frames_processed += 1;

        let report = Report::from_status(frame_index, status);
        if let Report::Classified(analysis) = &report {
            debug!(
                "frame {frame_index}: {:.2}% foreground",
                analysis.foreground_fraction * 100.0
            );
        }
        Ok(report)
    }

    pub fn process_buffer(&mut self, frame_buffer: &[u8], layout: PixelLayout) -> Result<Report, MixtureError> {
        let pixels = pixels_from_buffer(frame_buffer, layout)?;
        self.process_pixels(&pixels)
    }

    pub fn process_image(&mut self, frame: &RgbImage) -> Result<Report, MixtureError> {
        if frame.dimensions() != (self.grid.width(), self.grid.height()) {
            return Err(MixtureError::InvalidDimensions {
                width: frame.width(),
                height: frame.height(),
            });
        }
        self.process_pixels(&pixels_from_image(frame))
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn grid(&self) -> &PixelMixtureGrid {
        &self.grid
    }
}
