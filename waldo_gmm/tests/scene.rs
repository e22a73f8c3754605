use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use waldo_gmm::{MixtureConfig, ParallelPipeline, Pixel, Report, VisionPipeline};

const WIDTH: u32 = 16;
const HEIGHT: u32 = 6;
const BLOCK: u32 = 2;

fn config(seed: u64) -> MixtureConfig {
    MixtureConfig {
        components: 3,
        warmup_frames: 8,
        seed: Some(seed),
        ..MixtureConfig::default()
    }
}

/// A fixed random backdrop, one color per pixel.
fn backdrop(rng: &mut StdRng) -> Vec<Pixel> {
    (0..WIDTH * HEIGHT)
        .map(|_| Pixel::new(rng.gen_range(20..230), rng.gen_range(20..230), rng.gen_range(20..230)))
        .collect()
}

fn jitter(rng: &mut StdRng, base: &[Pixel], amplitude: i16) -> Vec<Pixel> {
    let mut channel = |value: u8| (value as i16 + rng.gen_range(-amplitude..=amplitude)).clamp(0, 255) as u8;
    base.iter()
        .map(|pixel| Pixel::new(channel(pixel.red), channel(pixel.green), channel(pixel.blue)))
        .collect()
}

fn in_block(x: u32, y: u32, block_x: u32) -> bool {
    (block_x..block_x + BLOCK).contains(&x) && (2..2 + BLOCK).contains(&y)
}

fn with_block(base: &[Pixel], block_x: u32) -> Vec<Pixel> {
    let mut frame = base.to_vec();
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            if in_block(x, y, block_x) {
                frame[(y * WIDTH + x) as usize] = Pixel::new(255, 0, 255);
            }
        }
    }
    frame
}

fn masks(reports: Vec<Report>) -> Vec<Vec<bool>> {
    reports
        .iter()
        .filter_map(|report| report.mask().map(|mask| mask.flags().to_vec()))
        .collect()
}

#[test]
fn sensor_noise_on_a_static_scene_stays_background() {
    let mut rng = StdRng::seed_from_u64(42);
    let base = backdrop(&mut rng);
    let mut pipeline = VisionPipeline::new(WIDTH, HEIGHT, config(1)).unwrap();

    for frame_index in 0..40 {
        let report = pipeline.process_pixels(&jitter(&mut rng, &base, 2)).unwrap();
        match report {
            Report::Calibrating { .. } => assert!(frame_index < 8),
            Report::Classified(analysis) => {
                assert_eq!(analysis.foreground_fraction, 0.0, "frame {frame_index}");
            }
        }
    }
}

#[test]
fn a_moving_block_is_foreground_exactly_where_it_is() {
    let mut rng = StdRng::seed_from_u64(7);
    let base = backdrop(&mut rng);
    let mut pipeline = VisionPipeline::new(WIDTH, HEIGHT, config(2)).unwrap();
    for _ in 0..8 {
        pipeline.process_pixels(&base).unwrap();
    }

    for block_x in (0..WIDTH).step_by(BLOCK as usize) {
        let report = pipeline.process_pixels(&with_block(&base, block_x)).unwrap();
        let mask = report.mask().expect("classified frame");
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                assert_eq!(
                    mask.is_background(x, y),
                    !in_block(x, y, block_x),
                    "pixel ({x}, {y}) with block at {block_x}"
                );
            }
        }
    }

    let report = pipeline.process_pixels(&base).unwrap();
    assert_eq!(report.mask().map(|mask| mask.foreground_count()), Some(0));
}

#[test]
fn identical_seeds_build_identical_models() {
    let mut rng = StdRng::seed_from_u64(9);
    let base = backdrop(&mut rng);
    let frames: Vec<Vec<Pixel>> = (0..8).map(|_| jitter(&mut rng, &base, 6)).collect();

    let mut first = VisionPipeline::new(WIDTH, HEIGHT, config(123)).unwrap();
    let mut second = VisionPipeline::new(WIDTH, HEIGHT, config(123)).unwrap();
    for frame in &frames {
        first.process_pixels(frame).unwrap();
        second.process_pixels(frame).unwrap();
    }

    assert!(first.grid().is_warmed_up());
    assert_eq!(first.grid().mixtures(), second.grid().mixtures());
}

#[tokio::test]
async fn a_single_band_matches_the_sequential_pipeline() {
    let mut rng = StdRng::seed_from_u64(11);
    let base = backdrop(&mut rng);
    let frames: Vec<Vec<Pixel>> = (0..30u32)
        .map(|index| {
            let noisy = jitter(&mut rng, &base, 5);
            if index > 12 && index % 3 == 0 { with_block(&noisy, (index % 8) * BLOCK) } else { noisy }
        })
        .collect();

    let config = MixtureConfig {
        workers: Some(1),
        ..config(77)
    };
    let mut sequential = VisionPipeline::new(WIDTH, HEIGHT, config.clone()).unwrap();
    let mut parallel = ParallelPipeline::new(WIDTH, HEIGHT, config).unwrap();

    let mut sequential_reports = Vec::new();
    let mut parallel_reports = Vec::new();
    for frame in &frames {
        sequential_reports.push(sequential.process_pixels(frame).unwrap());
        parallel_reports.push(parallel.process_pixels(frame).await.unwrap());
    }

    assert_eq!(sequential_reports, parallel_reports);
    parallel.shutdown().await;
}

#[tokio::test]
async fn banding_does_not_change_masks_for_a_deterministic_warm_up() {
    let mut rng = StdRng::seed_from_u64(5);
    let base = backdrop(&mut rng);
    let config = MixtureConfig {
        workers: Some(4),
        ..config(0)
    };
    let mut sequential = VisionPipeline::new(WIDTH, HEIGHT, config.clone()).unwrap();
    let mut parallel = ParallelPipeline::new(WIDTH, HEIGHT, config).unwrap();
    assert_eq!(parallel.band_count(), 4);

    let mut sequential_reports = Vec::new();
    let mut parallel_reports = Vec::new();
    for _ in 0..8 {
        sequential_reports.push(sequential.process_pixels(&base).unwrap());
        parallel_reports.push(parallel.process_pixels(&base).await.unwrap());
    }
    for index in 0..20u32 {
        let frame = with_block(&jitter(&mut rng, &base, 3), (index % 8) * BLOCK);
        sequential_reports.push(sequential.process_pixels(&frame).unwrap());
        parallel_reports.push(parallel.process_pixels(&frame).await.unwrap());
    }

    let sequential_masks = masks(sequential_reports);
    assert_eq!(sequential_masks.len(), 20);
    assert_eq!(sequential_masks, masks(parallel_reports));
    parallel.shutdown().await;
}
