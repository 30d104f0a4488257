use super::{MAX_CHANNELS, MAX_COMPONENTS};

/// One Gaussian hypothesis about a pixel's appearance.
///
/// The covariance is isotropic (`variance * I`) across the active channels.
/// Channels past the pixel's channel count are unused and kept at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Component {
    pub mean: [f32; MAX_CHANNELS],
    pub variance: f32,
    pub weight: f32,
}

impl Component {
    /// A component centred on `observation`.
    pub fn seeded(observation: &[f32], variance: f32, weight: f32) -> Self {
        let mut mean = [0.0; MAX_CHANNELS];
        mean[..observation.len()].copy_from_slice(observation);
        Self {
            mean,
            variance,
            weight,
        }
    }

    /// A component with the same value in every active channel.
    pub fn uniform(value: f32, channels: usize, variance: f32, weight: f32) -> Self {
        let mut mean = [0.0; MAX_CHANNELS];
        mean[..channels].fill(value);
        Self {
            mean,
            variance,
            weight,
        }
    }

    /// Squared Euclidean distance between the observation and the mean.
    pub fn squared_distance(&self, observation: &[f32]) -> f32 {
        observation
            .iter()
            .zip(&self.mean)
            .map(|(x, mu)| (x - mu) * (x - mu))
            .sum()
    }

    /// Mahalanobis test against `variance * I`: the observation lies within
    /// `t_sigma` standard deviations of the mean.
    pub fn matches(&self, observation: &[f32], t_sigma: f32) -> bool {
        self.squared_distance(observation) <= t_sigma * t_sigma * self.variance
    }

    /// Density of the isotropic Gaussian at `observation`.
    pub fn density(&self, observation: &[f32]) -> f32 {
        let dims = observation.len() as f32;
        let norm = (2.0 * std::f32::consts::PI * self.variance).powf(-0.5 * dims);
        norm * (-0.5 * self.squared_distance(observation) / self.variance).exp()
    }

    /// Ranking score: persistent (heavy) and tight (low variance) components
    /// score highest.
    pub fn confidence(&self) -> f32 {
        if self.variance > 0.0 {
            self.weight / self.variance.sqrt()
        } else if self.weight > 0.0 {
            f32::INFINITY
        } else {
            0.0
        }
    }
}

/// Outcome of renormalizing a pixel's weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renormalization {
    Normalized,
    /// The weight sum was zero or non-finite; weights were reset to 1/K.
    Degenerate,
}

/// Index of the lowest-weight component. Ties go to the lowest index.
pub fn weakest(components: &[Component]) -> usize {
    let mut weakest = 0;
    for (index, component) in components.iter().enumerate().skip(1) {
        if component.weight < components[weakest].weight {
            weakest = index;
        }
    }
    weakest
}

/// Replaces the weakest component with one centred on `observation`.
/// Returns the index that was replaced.
pub fn replace_weakest(
    components: &mut [Component],
    observation: &[f32],
    variance: f32,
    weight: f32,
) -> usize {
    let index = weakest(components);
    components[index] = Component::seeded(observation, variance, weight);
    index
}

pub fn weight_sum(components: &[Component]) -> f32 {
    components.iter().map(|c| c.weight).sum()
}

/// Divides every weight by the weight sum so they add up to one.
pub fn renormalize(components: &mut [Component]) -> Renormalization {
    let sum = weight_sum(components);
    if sum > 0.0 && sum.is_finite() {
        for component in components.iter_mut() {
            component.weight /= sum;
        }
        Renormalization::Normalized
    } else {
        let uniform = 1.0 / components.len() as f32;
        for component in components.iter_mut() {
            component.weight = uniform;
        }
        Renormalization::Degenerate
    }
}

/// Rebuilds a pixel's store from the neutral prior.
pub fn seed_prior(
    components: &mut [Component],
    channels: usize,
    mean: f32,
    variance: f32,
) {
    debug_assert!(components.len() <= MAX_COMPONENTS);
    let weight = 1.0 / components.len() as f32;
    components.fill(Component::uniform(mean, channels, variance, weight));
}
