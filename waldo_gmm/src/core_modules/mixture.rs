// THEORY:
// The `PixelMixture` is the heart of the engine. It is a stateful, learning entity
// responsible for exactly one pixel location. It holds K Gaussian hypotheses about the
// colors that location shows and, for each new observation, decides whether that color
// is "background" (explained by the probable, tight components) or "foreground".
//
// Key architectural principles:
// 1.  **Ranked hypotheses**: Components are always sorted by `weight / sqrt(variance)`.
//     The leading components whose cumulative weight reaches the background threshold
//     form the "background prefix".
// 2.  **Online learning**: Each observation updates the model in place. The first
//     component within 2.5 variances absorbs it; every component after it decays. If
//     nothing matches, the least probable component is recycled at the observation.
// 3.  **Two thresholds**: Background classification uses a wider 7.5-variance window on
//     the prefix, independent of which component ends up matching.
// 4.  **Isolation**: A mixture reads and writes only its own components. This is what
//     lets the grid partition pixels freely across workers.
//
// Invariants after `init` and after every `update`: weights sum to one, components are
// non-increasing in sort key, and every variance lies in `[min, 5 × high]`.

use log::warn;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::{InitVariance, MixtureConfig, MixtureParams};
use crate::core_modules::component::MixtureComponent;
use crate::core_modules::pixel::{Channels, Pixel, gray_level};
use crate::error::MixtureError;

/// A component matches an observation inside this many variances (squared distance).
pub const MATCH_THRESHOLD: f64 = 2.5;
/// A background-prefix component explains an observation inside this many variances.
pub const BACKGROUND_MATCH_THRESHOLD: f64 = 7.5;

/// The adaptive Gaussian mixture for a single pixel location.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelMixture {
    components: Vec<MixtureComponent>,
    params: MixtureParams,
}

impl PixelMixture {
    /// Seeds `config.components` components from a warm-up buffer.
    ///
    /// Means are drawn from `samples` without replacement; weights start uniform.
    pub fn init<R: Rng + ?Sized>(
        samples: &[Pixel],
        config: &MixtureConfig,
        rng: &mut R,
    ) -> Result<Self, MixtureError> {
        let count = config.components;
        if count == 0 {
            return Err(MixtureError::NoComponents);
        }
        if samples.len() < count {
            return Err(MixtureError::TooFewSamples {
                samples: samples.len(),
                components: count,
            });
        }

        let params = config.params();
        let weight = 1.0 / count as f64;
        let mut indices: Vec<usize> = (0..samples.len()).collect();
        let (chosen, _) = indices.partial_shuffle(rng, count);

        let components = chosen
            .iter()
            .map(|&index| {
                let mean = samples[index].channels();
                let variance = initial_variance(config.init_variance, samples, &mean);
                MixtureComponent::new(mean, variance, weight, &params)
            })
            .collect();

        let mut mixture = Self { components, params };
        mixture.sort_components();
        Ok(mixture)
    }

    /// Wraps hand-built components. Weights are taken as given; the components are sorted.
    pub fn from_components(
        components: Vec<MixtureComponent>,
        params: MixtureParams,
    ) -> Result<Self, MixtureError> {
        if components.is_empty() {
            return Err(MixtureError::NoComponents);
        }
        let mut mixture = Self { components, params };
        mixture.sort_components();
        Ok(mixture)
    }

    pub fn components(&self) -> &[MixtureComponent] {
        &self.components
    }

    pub fn params(&self) -> &MixtureParams {
        &self.params
    }

    pub fn total_weight(&self) -> f64 {
        self.components.iter().map(MixtureComponent::weight).sum()
    }

    /// Number of leading components treated as background.
    ///
    /// A component joins while the weight accumulated *before* it is still below
    /// `background_threshold`, so the first component always joins.
    pub fn background_prefix_len(&self, background_threshold: f64) -> usize {
        let mut cumulative = 0.0;
        let mut prefix_len = 0;
        for component in &self.components {
            if cumulative >= background_threshold {
                break;
            }
            prefix_len += 1;
            cumulative += component.weight();
        }
        prefix_len.max(1)
    }

    /// Folds one observation into the mixture and classifies it.
    ///
    /// Returns `true` when the observation is background.
    pub fn update(&mut self, observation: &Pixel, background_threshold: f64) -> bool {
        let params = self.params;
        let prefix_len = self.background_prefix_len(background_threshold);
        let mut is_background = false;
        let mut matched = false;

        for (index, component) in self.components.iter_mut().enumerate() {
            let squared_distance = component.squared_distance(observation);
            let in_prefix = index < prefix_len;

            if in_prefix && squared_distance < BACKGROUND_MATCH_THRESHOLD * component.variance() {
                is_background = true;
            }

            if matched {
                component.decay(params.learning_rate);
            } else if squared_distance < MATCH_THRESHOLD * component.variance() {
                component.absorb(observation, squared_distance, &params);
                if in_prefix {
                    is_background = true;
                }
                matched = true;
            }
        }

        if !matched {
            self.replace_least_probable(observation);
        }
        self.renormalize();
        self.sort_components();

        is_background
    }

    /// Recycles the last slot at `observation`. The new component inherits the slot's weight.
    fn replace_least_probable(&mut self, observation: &Pixel) {
        let params = self.params;
        if let Some(last) = self.components.last_mut() {
            let inherited = last.weight();
            *last = MixtureComponent::new(
                observation.channels(),
                params.high_variance,
                inherited,
                &params,
            );
        }
    }

    fn renormalize(&mut self) {
        let weight_sum = self.total_weight();
        if !weight_sum.is_finite() || weight_sum <= f64::EPSILON {
            warn!(
                "degenerate mixture weight sum {weight_sum}, resetting {} components to uniform weights",
                self.components.len()
            );
            let uniform = 1.0 / self.components.len() as f64;
            for component in &mut self.components {
                component.set_weight(uniform);
            }
            return;
        }
        for component in &mut self.components {
            component.set_weight(component.weight() / weight_sum);
        }
    }

    fn sort_components(&mut self) {
        self.components
            .sort_by(|a, b| b.sort_key().total_cmp(&a.sort_key()));
    }
}

fn initial_variance(mode: InitVariance, samples: &[Pixel], mean: &Channels) -> f64 {
    let count = samples.len() as f64;
    match mode {
        InitVariance::Reference => {
            let gray = gray_level(mean);
            samples
                .iter()
                .map(|sample| sample.channels().iter().map(|value| value - gray).sum::<f64>())
                .sum::<f64>()
                / count
        }
        InitVariance::Squared => {
            samples
                .iter()
                .map(|sample| sample.squared_distance(mean))
                .sum::<f64>()
                / (3.0 * count)
        }
    }
}
