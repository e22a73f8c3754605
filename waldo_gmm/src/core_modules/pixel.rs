// THEORY:
// The `Pixel` module is the most fundamental unit of the engine. It is a "dumb" data
// container for one color observation at one pixel location in one frame. It knows
// how to read itself out of a raw frame buffer and how to measure itself against a
// mixture component's mean, nothing more.
//
// Key principles:
// 1) Layout-agnostic input: frames arrive as RGB, RGBA or BGR byte buffers (cameras
//    and OpenCV hand out BGR). Everything is normalized to (red, green, blue) here so
//    the model never sees byte order.
// 2) Alpha is dropped. The model is three-channel.
// 3) Distances are squared and never square-rooted; the match thresholds compare
//    squared distance against variance directly.

use image::{Rgb, RgbImage};

use crate::error::MixtureError;

pub type Byte = u8;
pub type Channel = Byte;
/// A channel value lifted into model space.
pub type Intensity = f64;
pub type Channels = [Intensity; 3];

/// One three-channel color observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pixel {
    pub red: Channel,
    pub green: Channel,
    pub blue: Channel,
}

/// Byte layout of a raw frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb8,
    Rgba8,
    Bgr8,
}

impl PixelLayout {
    pub fn channels(&self) -> usize {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Bgr8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }

    #[inline]
    fn read(&self, bytes: &[Byte]) -> Pixel {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Rgba8 => Pixel::new(bytes[0], bytes[1], bytes[2]),
            PixelLayout::Bgr8 => Pixel::new(bytes[2], bytes[1], bytes[0]),
        }
    }
}

impl Pixel {
    pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
        Pixel { red, green, blue }
    }

    pub fn channels(&self) -> Channels {
        [
            self.red as Intensity,
            self.green as Intensity,
            self.blue as Intensity,
        ]
    }

    /// Gray level as the plain mean of the three channels.
    pub fn gray(&self) -> Intensity {
        gray_level(&self.channels())
    }

    /// Sum of squared per-channel differences to `mean`.
    #[inline]
    pub fn squared_distance(&self, mean: &Channels) -> f64 {
        self.channels()
            .iter()
            .zip(mean)
            .map(|(value, mean)| (mean - value).powi(2))
            .sum()
    }
}

impl From<Rgb<u8>> for Pixel {
    fn from(rgb: Rgb<u8>) -> Self {
        let [red, green, blue] = rgb.0;
        Pixel::new(red, green, blue)
    }
}

impl From<Pixel> for Rgb<u8> {
    fn from(pixel: Pixel) -> Self {
        Rgb([pixel.red, pixel.green, pixel.blue])
    }
}

impl TryFrom<&[Byte]> for Pixel {
    type Error = MixtureError;

    /// Reads 3 (RGB) or 4 (RGBA) bytes.
    fn try_from(bytes: &[Byte]) -> Result<Self, Self::Error> {
        match bytes.len() {
            3 => Ok(PixelLayout::Rgb8.read(bytes)),
            4 => Ok(PixelLayout::Rgba8.read(bytes)),
            channels => Err(MixtureError::UnsupportedChannelCount { channels }),
        }
    }
}

/// Plain mean of three channel values. Also applied to component means.
#[inline]
pub fn gray_level(channels: &Channels) -> Intensity {
    channels.iter().sum::<Intensity>() / 3.0
}

/// Splits a raw frame buffer into row-major pixels.
pub fn pixels_from_buffer(buffer: &[Byte], layout: PixelLayout) -> Result<Vec<Pixel>, MixtureError> {
    let stride = layout.channels();
    if buffer.len() % stride != 0 {
        return Err(MixtureError::FrameSizeMismatch {
            expected: buffer.len() - buffer.len() % stride,
            found: buffer.len(),
        });
    }
    Ok(buffer.chunks_exact(stride).map(|bytes| layout.read(bytes)).collect())
}

pub fn pixels_from_image(image: &RgbImage) -> Vec<Pixel> {
    image.pixels().map(|rgb| Pixel::from(*rgb)).collect()
}
