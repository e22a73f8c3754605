use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use clap::Args;
use serde::Deserialize;
use waldo_gmm::MixtureConfig;

/// Frames are scaled by this factor before analysis.
pub const DEFAULT_RESIZE_FACTOR: f64 = 0.5;

/// Settings for one tester run, loadable from a TOML file.
///
/// ```toml
/// resize_factor = 0.25
/// parallel = true
///
/// [mixture]
/// components = 5
/// learning_rate = 0.01
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    pub resize_factor: f64,
    pub parallel: bool,
    pub mixture: MixtureConfig,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            resize_factor: DEFAULT_RESIZE_FACTOR,
            parallel: false,
            mixture: MixtureConfig::default(),
        }
    }
}

impl TesterConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.resize_factor.is_finite() && self.resize_factor > 0.0,
            "resize factor must be positive, got {}",
            self.resize_factor
        );
        self.mixture.validate()?;
        Ok(())
    }
}

pub fn parse_config(contents: &str) -> Result<TesterConfig> {
    Ok(toml::from_str(contents)?)
}

pub fn load_config(path: &Path) -> Result<TesterConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config file {}", path.display()))
}

/// Command-line overrides, applied on top of the config file.
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Gaussian components per pixel
    #[arg(short = 'k', long)]
    pub components: Option<usize>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Fraction of mixture weight treated as background
    #[arg(long)]
    pub background_threshold: Option<f64>,

    /// Frames buffered before the model is built
    #[arg(long)]
    pub warmup_frames: Option<usize>,

    /// Seed for warm-up sampling, for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Band workers for --parallel (defaults to one per CPU)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Scale applied to every frame before analysis
    #[arg(long)]
    pub resize_factor: Option<f64>,

    /// Run on the band-parallel pipeline
    #[arg(long)]
    pub parallel: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut TesterConfig) {
        let mixture = &mut config.mixture;
        if let Some(components) = self.components {
            mixture.components = components;
        }
        if let Some(learning_rate) = self.learning_rate {
            mixture.learning_rate = learning_rate;
        }
        if let Some(threshold) = self.background_threshold {
            mixture.background_threshold = threshold;
        }
        if let Some(warmup_frames) = self.warmup_frames {
            mixture.warmup_frames = warmup_frames;
        }
        if self.seed.is_some() {
            mixture.seed = self.seed;
        }
        if self.workers.is_some() {
            mixture.workers = self.workers;
        }
        if let Some(resize_factor) = self.resize_factor {
            config.resize_factor = resize_factor;
        }
        config.parallel |= self.parallel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waldo_gmm::InitVariance;

    #[test]
    fn partial_files_keep_defaults() {
        let config = parse_config(
            r#"
            parallel = true

            [mixture]
            components = 4
            init_variance = "squared"
            "#,
        )
        .unwrap();

        assert!(config.parallel);
        assert_eq!(config.resize_factor, DEFAULT_RESIZE_FACTOR);
        assert_eq!(config.mixture.components, 4);
        assert_eq!(config.mixture.init_variance, InitVariance::Squared);
        assert_eq!(config.mixture.learning_rate, MixtureConfig::default().learning_rate);
        assert_eq!(config.mixture.seed, None);
    }

    #[test]
    fn empty_file_is_the_default() {
        assert_eq!(parse_config("").unwrap(), TesterConfig::default());
    }

    #[test]
    fn unknown_variance_mode_is_an_error() {
        assert!(parse_config("[mixture]\ninit_variance = \"bogus\"").is_err());
    }

    #[test]
    fn overrides_win_over_the_file() {
        let mut config = parse_config("resize_factor = 0.25\n[mixture]\nseed = 3").unwrap();
        let overrides = Overrides {
            components: Some(2),
            seed: Some(9),
            resize_factor: Some(1.0),
            ..Overrides::default()
        };
        overrides.apply(&mut config);

        assert_eq!(config.mixture.components, 2);
        assert_eq!(config.mixture.seed, Some(9));
        assert_eq!(config.resize_factor, 1.0);
        assert!(!config.parallel);
    }

    #[test]
    fn validation_covers_resize_and_mixture() {
        let mut config = TesterConfig::default();
        assert!(config.validate().is_ok());

        config.resize_factor = 0.0;
        assert!(config.validate().is_err());

        config.resize_factor = 1.0;
        config.mixture.warmup_frames = 1;
        assert!(config.validate().is_err());
    }
}
