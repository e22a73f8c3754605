mod config;
mod frames;

use std::fs;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use image::RgbImage;
use log::info;
use waldo_gmm::{MixtureConfig, MixtureError, ParallelPipeline, Report, VisionPipeline};

use crate::config::{Overrides, TesterConfig, load_config};
use crate::frames::{FrameLoader, list_frames, write_outputs};

/// Runs background subtraction over a directory of frames and writes a mask and a
/// foreground composite for every classified frame.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory of input frames (png, jpg or bmp), processed in filename order
    input: PathBuf,

    /// Directory the masks and composites are written to
    output: PathBuf,

    /// TOML file with tester and mixture settings
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log every frame
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,
}

enum Engine {
    Sequential(VisionPipeline),
    Parallel(ParallelPipeline),
}

impl Engine {
    fn new(width: u32, height: u32, config: &TesterConfig) -> Result<Self, MixtureError> {
        let mixture: MixtureConfig = config.mixture.clone();
        if config.parallel {
            Ok(Engine::Parallel(ParallelPipeline::new(width, height, mixture)?))
        } else {
            Ok(Engine::Sequential(VisionPipeline::new(width, height, mixture)?))
        }
    }

    async fn process(&mut self, frame: &RgbImage) -> Result<Report, MixtureError> {
        match self {
            Engine::Sequential(pipeline) => pipeline.process_image(frame),
            Engine::Parallel(pipeline) => pipeline.process_image(frame).await,
        }
    }

    async fn finish(self) {
        if let Engine::Parallel(pipeline) = self {
            pipeline.shutdown().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Argument Parsing & Setup ---
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TesterConfig::default(),
    };
    cli.overrides.apply(&mut config);
    config.validate()?;

    // --- 2. Frame I/O Initialization ---
    let paths = list_frames(&cli.input)?;
    let Some((first_path, rest)) = paths.split_first() else {
        bail!("no frames found in {}", cli.input.display());
    };
    fs::create_dir_all(&cli.output)?;

    let mut loader = FrameLoader::new(config.resize_factor);
    let first = loader.load(first_path)?;
    let (width, height) = first.dimensions();
    info!(
        "{} frames at {}x{}, {} engine, {} components, {} warm-up frames",
        paths.len(),
        width,
        height,
        if config.parallel { "parallel" } else { "sequential" },
        config.mixture.components,
        config.mixture.warmup_frames
    );

    // --- 3. Vision Pipeline Initialization ---
    let mut engine = Engine::new(width, height, &config)?;

    // --- 4. Main Processing Loop ---
    let mut classified = 0usize;
    let mut frame = first;
    let mut remaining = rest.iter();
    loop {
        match engine.process(&frame).await? {
            Report::Calibrating {
                frames_buffered,
                frames_required,
            } => info!("calibrating: {frames_buffered}/{frames_required} frames"),
            Report::Classified(analysis) => {
                write_outputs(&cli.output, analysis.frame_index, &analysis.mask, &frame)?;
                info!(
                    "frame {:04}: {:.2}% foreground",
                    analysis.frame_index,
                    analysis.foreground_fraction * 100.0
                );
                classified += 1;
            }
        }

        match remaining.next() {
            Some(path) => frame = loader.load(path)?,
            None => break,
        }
    }

    engine.finish().await;
    println!(
        "Processing complete. {} masks saved to {}",
        classified,
        cli.output.display()
    );
    Ok(())
}
