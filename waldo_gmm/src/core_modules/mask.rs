// THEORY:
// A `BackgroundMask` is the final output of one classified frame: one flag per pixel
// location, row-major, `true` meaning background. It is a plain data container with a
// few compositing helpers for the consumers downstream (writers, visualizers).
//
// Conventions shared with every consumer:
// - the mask image encodes background as 0 and foreground as 255;
// - compositing keeps foreground pixels and zeroes background pixels.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::error::MixtureError;

const BACKGROUND_LEVEL: u8 = 0;
const FOREGROUND_LEVEL: u8 = 255;

/// Per-pixel background flags for a full frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundMask {
    width: u32,
    height: u32,
    background: Vec<bool>,
}

impl BackgroundMask {
    pub fn new(width: u32, height: u32, background: Vec<bool>) -> Self {
        debug_assert_eq!(background.len(), width as usize * height as usize);
        Self {
            width,
            height,
            background,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major background flags.
    pub fn flags(&self) -> &[bool] {
        &self.background
    }

    pub fn is_background(&self, x: u32, y: u32) -> bool {
        self.background[(y * self.width + x) as usize]
    }

    pub fn foreground_count(&self) -> usize {
        self.background.iter().filter(|is_background| !**is_background).count()
    }

    pub fn foreground_fraction(&self) -> f64 {
        if self.background.is_empty() {
            return 0.0;
        }
        self.foreground_count() as f64 / self.background.len() as f64
    }

    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.is_background(x, y) {
                Luma([BACKGROUND_LEVEL])
            } else {
                Luma([FOREGROUND_LEVEL])
            }
        })
    }

    /// Copies `frame` with every background pixel zeroed.
    pub fn composite_foreground(&self, frame: &RgbImage) -> Result<RgbImage, MixtureError> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(MixtureError::InvalidDimensions {
                width: frame.width(),
                height: frame.height(),
            });
        }
        Ok(RgbImage::from_fn(self.width, self.height, |x, y| {
            if self.is_background(x, y) {
                Rgb([0, 0, 0])
            } else {
                *frame.get_pixel(x, y)
            }
        }))
    }

    /// Stacks horizontal bands, top to bottom, into one mask.
    pub(crate) fn stack(bands: Vec<BackgroundMask>) -> Result<BackgroundMask, MixtureError> {
        let width = bands.first().map(|band| band.width).unwrap_or(0);
        let mut height = 0;
        let mut background = Vec::new();
        for band in bands {
            if band.width != width {
                return Err(MixtureError::InvalidDimensions {
                    width: band.width,
                    height: band.height,
                });
            }
            height += band.height;
            background.extend(band.background);
        }
        Ok(BackgroundMask::new(width, height, background))
    }
}
