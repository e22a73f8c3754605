// THEORY:
// This file is the main entry point for the `waldo_gmm` library crate. It follows the
// standard Rust convention of using `lib.rs` to define the public API exposed to
// external consumers (like the `visual_tester` driver).
//
// The engine classifies every pixel of a video stream as background or foreground by
// keeping, independently per pixel, an adaptive mixture of Gaussians over the colors
// that pixel has shown (Stauffer & Grimson). The layers, leaves first:
//
// - `core_modules::pixel`        one color observation
// - `core_modules::component`    one Gaussian hypothesis
// - `core_modules::mixture`      K ranked hypotheses for one pixel, with the online update
// - `core_modules::grid_manager` one mixture per pixel, warm-up barrier, frame routing
// - `core_modules::mask`         the per-frame background mask
// - `pipeline`                   single-threaded frame API
// - `parallel_pipeline`          the same API over tokio band actors

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::{InitVariance, MixtureConfig, MixtureParams};
pub use core_modules::grid_manager::{GridStatus, PixelMixtureGrid};
pub use core_modules::mask::BackgroundMask;
pub use core_modules::pixel::{Pixel, PixelLayout};
pub use error::MixtureError;
pub use parallel_pipeline::ParallelPipeline;
pub use pipeline::{FrameAnalysis, Report, VisionPipeline};
