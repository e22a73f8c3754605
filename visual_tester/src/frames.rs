use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use waldo_gmm::BackgroundMask;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Image files in `directory`, in lexical filename order.
pub fn list_frames(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory)
        .with_context(|| format!("failed to read frame directory {}", directory.display()))?;

    let mut frames = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_frame(&path) {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

fn is_frame(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| extension.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Loads frames as RGB, scaled so that every frame matches the first one's scaled size.
pub struct FrameLoader {
    resize_factor: f64,
    target: Option<(u32, u32)>,
}

impl FrameLoader {
    pub fn new(resize_factor: f64) -> Self {
        Self {
            resize_factor,
            target: None,
        }
    }

    pub fn load(&mut self, path: &Path) -> Result<RgbImage> {
        let frame = image::open(path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8();
        let resize_factor = self.resize_factor;
        let (width, height) = *self
            .target
            .get_or_insert_with(|| scaled_size(frame.dimensions(), resize_factor));

        if frame.dimensions() == (width, height) {
            return Ok(frame);
        }
        Ok(imageops::resize(&frame, width, height, FilterType::CatmullRom))
    }
}

fn scaled_size((width, height): (u32, u32), factor: f64) -> (u32, u32) {
    let scale = |side: u32| ((side as f64 * factor).round() as u32).max(1);
    (scale(width), scale(height))
}

/// Writes `mask_NNNN.png` and `foreground_NNNN.png` for one classified frame.
pub fn write_outputs(
    directory: &Path,
    frame_index: u64,
    mask: &BackgroundMask,
    frame: &RgbImage,
) -> Result<()> {
    let mask_path = directory.join(format!("mask_{frame_index:04}.png"));
    mask.to_image()
        .save(&mask_path)
        .with_context(|| format!("failed to write {}", mask_path.display()))?;

    let foreground_path = directory.join(format!("foreground_{frame_index:04}.png"));
    mask.composite_foreground(frame)?
        .save(&foreground_path)
        .with_context(|| format!("failed to write {}", foreground_path.display()))?;
    Ok(())
}
