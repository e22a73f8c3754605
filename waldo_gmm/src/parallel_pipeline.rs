// THEORY:
// The parallel pipeline runs the same model as `VisionPipeline`, cut into horizontal
// row bands. Each band is a complete `PixelMixtureGrid` for its rows, owned by one
// spawned actor task that receives frames over a bounded channel and answers on a
// oneshot. Pixels never look at their neighbors, so bands share nothing but the
// read-only frame (`Arc<[Pixel]>`).
//
// Ordering: `process_frame` takes `&mut self` and waits for every band's reply before
// returning, so a band never sees frame n + 1 before all bands have finished frame n.
// Within a band the channel preserves arrival order.
//
// Bands are seeded as `seed + band_index`, so a single-band run reproduces
// `VisionPipeline` with the same seed.

use std::ops::Range;
use std::sync::Arc;

use futures::future::join_all;
use image::RgbImage;
use log::{debug, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::MixtureConfig;
use crate::core_modules::grid_manager::{GridStatus, PixelMixtureGrid};
use crate::core_modules::mask::BackgroundMask;
use crate::core_modules::pixel::{Pixel, PixelLayout, pixels_from_buffer, pixels_from_image};
use crate::error::MixtureError;
use crate::pipeline::Report;

const BAND_QUEUE_DEPTH: usize = 2;

type BandReply = oneshot::Sender<Result<GridStatus, MixtureError>>;

/// Message type for band actors
enum BandMessage {
    Observe(Arc<[Pixel]>, BandReply),
    Shutdown,
}

struct Band {
    rows: Range<u32>,
    sender: mpsc::Sender<BandMessage>,
    worker: Option<JoinHandle<()>>,
}

/// Background subtraction with one actor task per row band.
pub struct ParallelPipeline {
    image_width: u32,
    image_height: u32,
    bands: Vec<Band>,
    frames_processed: u64,
}

impl ParallelPipeline {
    /// Spawns the band actors. Uses `config.workers` bands, or one per CPU, never more than
    /// there are rows.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn new(image_width: u32, image_height: u32, config: MixtureConfig) -> Result<Self, MixtureError> {
        config.validate()?;
        if image_width == 0 || image_height == 0 {
            return Err(MixtureError::InvalidDimensions {
                width: image_width,
                height: image_height,
            });
        }

        let workers = config
            .workers
            .unwrap_or_else(num_cpus::get)
            .clamp(1, image_height as usize);
        let mut bands = Vec::with_capacity(workers);

        for band_index in 0..workers {
            let rows = band_rows(image_height, workers, band_index);
            let grid = PixelMixtureGrid::with_rng(
                image_width,
                rows.end - rows.start,
                config.clone(),
                band_rng(config.seed, band_index),
            )?;
            let pixels = (rows.start as usize * image_width as usize)
                ..(rows.end as usize * image_width as usize);
            let (sender, receiver) = mpsc::channel::<BandMessage>(BAND_QUEUE_DEPTH);
            let worker = tokio::spawn(run_band(grid, pixels, receiver));
            bands.push(Band {
                rows,
                sender,
                worker: Some(worker),
            });
        }

        debug!(
            "parallel pipeline: {} bands over {}x{}",
            bands.len(),
            image_width,
            image_height
        );

        Ok(Self {
            image_width,
            image_height,
            bands,
            frames_processed: 0,
        })
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Row ranges owned by each band, top to bottom.
    pub fn band_rows(&self) -> Vec<Range<u32>> {
        self.bands.iter().map(|band| band.rows.clone()).collect()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub async fn process_pixels(&mut self, frame: &[Pixel]) -> Result<Report, MixtureError> {
        let expected = self.image_width as usize * self.image_height as usize;
        if frame.len() != expected {
            return Err(MixtureError::FrameSizeMismatch {
                expected,
                found: frame.len(),
            });
        }

        let frame: Arc<[Pixel]> = Arc::from(frame);
        let mut replies = Vec::with_capacity(self.bands.len());
        for band in &self.bands {
            let (reply, receiver) = oneshot::channel();
            band.sender
                .send(BandMessage::Observe(Arc::clone(&frame), reply))
                .await
                .map_err(|_| MixtureError::WorkerUnavailable)?;
            replies.push(receiver);
        }

        let mut statuses = Vec::with_capacity(replies.len());
        for reply in join_all(replies).await {
            let status = reply.map_err(|_| MixtureError::WorkerUnavailable)?;
            statuses.push(status?);
        }

        let frame_index = self.frames_processed;
        self.frames_processed += 1;
        let report = Report::from_status(frame_index, merge_band_statuses(statuses)?);
        if let Report::Classified(analysis) = &report {
            debug!(
                "frame {frame_index}: {:.2}% foreground across {} bands",
                analysis.foreground_fraction * 100.0,
                self.bands.len()
            );
        }
        Ok(report)
    }

    pub async fn process_buffer(
        &mut self,
        frame_buffer: &[u8],
        layout: PixelLayout,
    ) -> Result<Report, MixtureError> {
        let pixels = pixels_from_buffer(frame_buffer, layout)?;
        self.process_pixels(&pixels).await
    }

    pub async fn process_image(&mut self, frame: &RgbImage) -> Result<Report, MixtureError> {
        if frame.dimensions() != (self.image_width, self.image_height) {
            return Err(MixtureError::InvalidDimensions {
                width: frame.width(),
                height: frame.height(),
            });
        }
        self.process_pixels(&pixels_from_image(frame)).await
    }

    /// Stops every band actor and waits for it to exit.
    pub async fn shutdown(mut self) {
        for band in &mut self.bands {
            let _ = band.sender.send(BandMessage::Shutdown).await;
            if let Some(worker) = band.worker.take() {
                if worker.await.is_err() {
                    warn!("band worker for rows {:?} panicked during join", band.rows);
                }
            }
        }
    }
}

impl Drop for ParallelPipeline {
    fn drop(&mut self) {
        // Best effort shutdown on drop
        for band in &self.bands {
            let _ = band.sender.try_send(BandMessage::Shutdown);
        }
    }
}

async fn run_band(
    mut grid: PixelMixtureGrid,
    pixels: Range<usize>,
    mut receiver: mpsc::Receiver<BandMessage>,
) {
    while let Some(message) = receiver.recv().await {
        match message {
            BandMessage::Observe(frame, reply) => {
                let _ = reply.send(grid.process_frame(&frame[pixels.clone()]));
            }
            BandMessage::Shutdown => break,
        }
    }
}

/// Splits `height` rows into `bands` contiguous ranges whose sizes differ by at most one.
fn band_rows(height: u32, bands: usize, band_index: usize) -> Range<u32> {
    let height = height as usize;
    let start = band_index * height / bands;
    let end = (band_index + 1) * height / bands;
    start as u32..end as u32
}

fn band_rng(seed: Option<u64>, band_index: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(band_index as u64)),
        None => StdRng::from_entropy(),
    }
}

fn merge_band_statuses(statuses: Vec<GridStatus>) -> Result<GridStatus, MixtureError> {
    if statuses
        .iter()
        .all(|status| matches!(status, GridStatus::Classified(_)))
    {
        let masks: Vec<BackgroundMask> = statuses
            .into_iter()
            .filter_map(|status| match status {
                GridStatus::Classified(mask) => Some(mask),
                GridStatus::WarmingUp { .. } => None,
            })
            .collect();
        return Ok(GridStatus::Classified(BackgroundMask::stack(masks)?));
    }

    let mut warming = statuses.into_iter().map(|status| match status {
        GridStatus::WarmingUp { buffered, required } => Some((buffered, required)),
        GridStatus::Classified(_) => None,
    });
    let first = warming.next().flatten().ok_or(MixtureError::BandDesync)?;
    if warming.all(|progress| progress == Some(first)) {
        Ok(GridStatus::WarmingUp {
            buffered: first.0,
            required: first.1,
        })
    } else {
        Err(MixtureError::BandDesync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_rows_cover_the_image_without_gaps() {
        let rows: Vec<Range<u32>> = (0..3).map(|i| band_rows(7, 3, i)).collect();
        assert_eq!(rows, vec![0..2, 2..4, 4..7]);

        let rows: Vec<Range<u32>> = (0..4).map(|i| band_rows(4, 4, i)).collect();
        assert_eq!(rows, vec![0..1, 1..2, 2..3, 3..4]);
    }

    #[test]
    fn merge_requires_agreement() {
        let warming = GridStatus::WarmingUp {
            buffered: 2,
            required: 5,
        };
        assert_eq!(
            merge_band_statuses(vec![warming.clone(), warming.clone()]),
            Ok(warming.clone())
        );

        let classified = GridStatus::Classified(BackgroundMask::new(1, 1, vec![true]));
        assert_eq!(
            merge_band_statuses(vec![warming.clone(), classified.clone()]),
            Err(MixtureError::BandDesync)
        );

        let behind = GridStatus::WarmingUp {
            buffered: 1,
            required: 5,
        };
        assert_eq!(
            merge_band_statuses(vec![warming, behind]),
            Err(MixtureError::BandDesync)
        );

        match merge_band_statuses(vec![classified.clone(), classified]) {
            Ok(GridStatus::Classified(mask)) => assert_eq!(mask.height(), 2),
            other => panic!("expected a stacked mask, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn static_scene_is_background_in_every_band() {
        let config = MixtureConfig {
            components: 2,
            warmup_frames: 2,
            seed: Some(3),
            workers: Some(3),
            ..MixtureConfig::default()
        };
        let mut pipeline = ParallelPipeline::new(4, 5, config).unwrap();
        assert_eq!(pipeline.band_count(), 3);
        assert_eq!(pipeline.band_rows(), vec![0..1, 1..3, 3..5]);

        let frame = vec![Pixel::new(12, 34, 56); 20];
        for buffered in 1..=2 {
            assert_eq!(
                pipeline.process_pixels(&frame).await.unwrap(),
                Report::Calibrating {
                    frames_buffered: buffered,
                    frames_required: 2
                }
            );
        }

        let report = pipeline.process_pixels(&frame).await.unwrap();
        let mask = report.mask().expect("classified frame");
        assert_eq!((mask.width(), mask.height()), (4, 5));
        assert!(mask.flags().iter().all(|is_background| *is_background));
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn workers_never_exceed_rows() {
        let config = MixtureConfig {
            components: 1,
            warmup_frames: 1,
            workers: Some(16),
            ..MixtureConfig::default()
        };
        let pipeline = ParallelPipeline::new(8, 3, config).unwrap();
        assert_eq!(pipeline.band_count(), 3);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn wrong_frame_size_is_rejected_before_dispatch() {
        let config = MixtureConfig {
            components: 1,
            warmup_frames: 1,
            workers: Some(2),
            ..MixtureConfig::default()
        };
        let mut pipeline = ParallelPipeline::new(2, 2, config).unwrap();
        assert_eq!(
            pipeline.process_pixels(&[Pixel::default(); 3]).await,
            Err(MixtureError::FrameSizeMismatch {
                expected: 4,
                found: 3
            })
        );
        assert_eq!(pipeline.frames_processed(), 0);
        pipeline.shutdown().await;
    }
}
