use crate::error::ConfigError;
use crate::mixture::MAX_COMPONENTS;

/// How the mean/variance adaptation rate ρ is derived from α on a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RhoPolicy {
    /// ρ = α. Predictable convergence, independent of how well the
    /// observation fits the matched component.
    #[default]
    Constant,
    /// ρ = α · N(x | μ, σ²I), clamped into [0, 1]. Well-fitting observations
    /// move the component further than marginal ones.
    Density,
}

/// Whether the background cutoff of a frame is computed from the state the
/// previous frame left behind or from the state after this frame's update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassificationOrder {
    /// Rank, then match/update. The mask judges the current observation
    /// against last frame's background set.
    #[default]
    BeforeUpdate,
    /// Match/update, then rank. The matched component's new weight already
    /// counts towards its own classification.
    AfterUpdate,
}

/// Parameters fixed for the lifetime of a background model.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureConfig {
    /// Number of Gaussian components per pixel (K).
    pub components: usize,
    /// Weight adaptation rate (α).
    pub alpha: f32,
    /// Match distance in standard deviations (`T_sigma`).
    pub t_sigma: f32,
    /// Cumulative weight that the background set must cover (β).
    pub beta: f32,
    /// Variance given to a component seeded by a replacement (`Sigma_0`).
    pub replacement_variance: f32,
    /// Weight given to a component seeded by a replacement (`w_0`).
    pub replacement_weight: f32,
    /// Mean of every component of the neutral prior, in every channel.
    pub initial_mean: f32,
    /// Variance of every component of the neutral prior.
    pub initial_variance: f32,
    /// Lower bound on a matched component's variance after an update.
    /// Zero (the default) leaves the online variance rule untouched.
    pub min_variance: f32,
    pub rho: RhoPolicy,
    pub order: ClassificationOrder,
}

impl Default for MixtureConfig {
    fn default() -> Self {
        Self {
            components: 3,
            alpha: 0.01,
            t_sigma: 2.5,
            beta: 0.8,
            replacement_variance: 100.0,
            replacement_weight: 0.05,
            initial_mean: 122.0,
            initial_variance: 36.0,
            min_variance: 0.0,
            rho: RhoPolicy::default(),
            order: ClassificationOrder::default(),
        }
    }
}

impl MixtureConfig {
    /// Checks every parameter; the first offending field is reported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.components == 0 || self.components > MAX_COMPONENTS {
            return Err(ConfigError::ComponentCount {
                value: self.components,
                max: MAX_COMPONENTS,
            });
        }
        // NaN fails both comparisons
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::Alpha(self.alpha));
        }
        if !(self.beta > 0.0 && self.beta <= 1.0) {
            return Err(ConfigError::Beta(self.beta));
        }
        if !(self.replacement_weight > 0.0 && self.replacement_weight <= 1.0) {
            return Err(ConfigError::ReplacementWeight(self.replacement_weight));
        }
        positive("t_sigma", self.t_sigma)?;
        positive("replacement_variance", self.replacement_variance)?;
        positive("initial_variance", self.initial_variance)?;
        if !self.initial_mean.is_finite() {
            return Err(ConfigError::NotFinite {
                name: "initial_mean",
                value: self.initial_mean,
            });
        }
        if !(self.min_variance.is_finite() && self.min_variance >= 0.0) {
            return Err(ConfigError::MinVariance(self.min_variance));
        }
        Ok(())
    }

    /// Weight of every component in the neutral prior.
    pub fn uniform_weight(&self) -> f32 {
        1.0 / self.components as f32
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}
