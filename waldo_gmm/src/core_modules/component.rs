// THEORY:
// A `MixtureComponent` is one Gaussian hypothesis about what color a single pixel
// location tends to show: a mean color, one isotropic variance shared by all three
// channels, and a weight (its prior share of the observations).
//
// The density is the 1-D normal evaluated at the squared 3-channel distance. It is not
// the 3-D normal (that would need `(2πσ²)^(3/2)`); the classifier is tuned against this
// form, so it stays.
//
// Every path that sets the variance goes through `MixtureParams::clamp_variance`, so the
// density and the sort key never divide by zero.

use std::f64::consts::PI;

use crate::config::MixtureParams;
use crate::core_modules::pixel::{Channels, Pixel};

/// Weights of components that lose to an earlier match never decay below this.
pub const MIN_WEIGHT: f64 = 1e-8;

/// One Gaussian hypothesis within a pixel's mixture.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureComponent {
    mean: Channels,
    variance: f64,
    weight: f64,
    /// `weight / sqrt(variance)`, cached for sorting.
    sort_key: f64,
}

impl MixtureComponent {
    /// Builds a component, clamping `variance` into the bounds of `params`.
    pub fn new(mean: Channels, variance: f64, weight: f64, params: &MixtureParams) -> Self {
        let mut component = Self {
            mean,
            variance: params.clamp_variance(variance),
            weight,
            sort_key: 0.0,
        };
        component.refresh_sort_key();
        component
    }

    pub fn mean(&self) -> Channels {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn sort_key(&self) -> f64 {
        self.sort_key
    }

    pub fn squared_distance(&self, observation: &Pixel) -> f64 {
        observation.squared_distance(&self.mean)
    }

    pub fn density(&self, squared_distance: f64) -> f64 {
        (1.0 / (2.0 * PI * self.variance).sqrt()) * (-squared_distance / (2.0 * self.variance)).exp()
    }

    pub(crate) fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
        self.refresh_sort_key();
    }

    /// Weight decay for a component that lost to a more probable match.
    pub(crate) fn decay(&mut self, learning_rate: f64) {
        self.set_weight(((1.0 - learning_rate) * self.weight).max(MIN_WEIGHT));
    }

    /// Pulls the component toward a matched observation.
    pub(crate) fn absorb(&mut self, observation: &Pixel, squared_distance: f64, params: &MixtureParams) {
        let learning_rate = params.learning_rate;
        let prior_variance = self.variance;

        self.weight = (1.0 - learning_rate) * self.weight + learning_rate;
        let rho = learning_rate * self.density(squared_distance);

        for (mean, value) in self.mean.iter_mut().zip(observation.channels()) {
            *mean = (1.0 - rho) * *mean + rho * value;
        }
        self.variance = params
            .clamp_variance((1.0 - rho) * prior_variance + rho * (squared_distance - prior_variance));
        self.refresh_sort_key();
    }

    fn refresh_sort_key(&mut self) {
        self.sort_key = self.weight / self.variance.sqrt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> MixtureParams {
        MixtureParams {
            learning_rate: 0.01,
            ..MixtureParams::default()
        }
    }

    #[test]
    fn density_uses_the_one_dimensional_normalizer() {
        let component = MixtureComponent::new([0.0; 3], 10.0, 1.0, &params());
        let expected = (1.0 / (20.0 * PI).sqrt()) * (-1.0f64 / 20.0).exp();
        assert_relative_eq!(component.density(1.0), expected, epsilon = 1e-15);
        assert_relative_eq!(component.density(0.0), 1.0 / (20.0 * PI).sqrt());
    }

    #[test]
    fn construction_clamps_variance() {
        let low = MixtureComponent::new([0.0; 3], 0.0, 0.5, &params());
        assert_eq!(low.variance(), 8.0);
        let high = MixtureComponent::new([0.0; 3], 1e9, 0.5, &params());
        assert_eq!(high.variance(), 180.0);
        assert_relative_eq!(high.sort_key(), 0.5 / 180.0f64.sqrt());
    }

    #[test]
    fn decay_is_floored() {
        let mut component = MixtureComponent::new([0.0; 3], 10.0, 1e-8, &params());
        component.decay(0.5);
        assert_eq!(component.weight(), MIN_WEIGHT);

        let mut component = MixtureComponent::new([0.0; 3], 10.0, 0.5, &params());
        component.decay(0.5);
        assert_relative_eq!(component.weight(), 0.25);
        assert_relative_eq!(component.sort_key(), 0.25 / 10.0f64.sqrt());
    }

    #[test]
    fn absorb_blends_with_the_prior_variance() {
        let params = params();
        let mut component = MixtureComponent::new([100.0; 3], 10.0, 1.0, &params);
        let observation = Pixel::new(101, 100, 100);
        let rho = 0.01 * component.density(1.0);

        component.absorb(&observation, 1.0, &params);

        assert_relative_eq!(component.weight(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(component.mean()[0], (1.0 - rho) * 100.0 + rho * 101.0);
        assert_relative_eq!(component.mean()[1], 100.0);
        assert_relative_eq!(component.variance(), (1.0 - rho) * 10.0 + rho * (1.0 - 10.0));
    }
}
