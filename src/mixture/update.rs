//! Match test, online update, weak-component replacement and renormalization
//! for a single pixel observation.

use super::component::{renormalize, replace_weakest, Component, Renormalization};
use crate::config::{MixtureConfig, RhoPolicy};

/// Which component, if any, explains an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Matched(usize),
    Unmatched,
}

/// The per-observation constants of a [`MixtureConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateParams {
    pub alpha: f32,
    pub t_sigma: f32,
    pub replacement_variance: f32,
    pub replacement_weight: f32,
    pub min_variance: f32,
    pub rho: RhoPolicy,
}

impl From<&MixtureConfig> for UpdateParams {
    fn from(config: &MixtureConfig) -> Self {
        Self {
            alpha: config.alpha,
            t_sigma: config.t_sigma,
            replacement_variance: config.replacement_variance,
            replacement_weight: config.replacement_weight,
            min_variance: config.min_variance,
            rho: config.rho,
        }
    }
}

/// Everything that happened to a pixel's store for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelUpdate {
    pub result: MatchResult,
    /// Index of the component seeded from the observation, on no match.
    pub replaced: Option<usize>,
    pub renormalization: Renormalization,
}

/// First-match scan in index order. A later, closer component never wins
/// over an earlier one that is within `t_sigma`.
pub fn find_match(components: &[Component], observation: &[f32], t_sigma: f32) -> MatchResult {
    components
        .iter()
        .position(|component| component.matches(observation, t_sigma))
        .map_or(MatchResult::Unmatched, MatchResult::Matched)
}

/// Applies one observation to a pixel's component store.
///
/// On a match the matched weight moves towards one and the rest decay by
/// `1 - alpha`; the matched mean and variance move towards the observation
/// at rate ρ. Without a match the weakest component is replaced. Weights are
/// renormalized in both cases.
pub fn update(
    components: &mut [Component],
    observation: &[f32],
    params: &UpdateParams,
) -> PixelUpdate {
    let result = find_match(components, observation, params.t_sigma);
    let replaced = match result {
        MatchResult::Matched(index) => {
            absorb(components, index, observation, params);
            None
        }
        MatchResult::Unmatched => Some(replace_weakest(
            components,
            observation,
            params.replacement_variance,
            params.replacement_weight,
        )),
    };

    PixelUpdate {
        result,
        replaced,
        renormalization: renormalize(components),
    }
}

/// Pure form of [`update`] for callers holding an owned store.
pub fn updated(
    mut components: Vec<Component>,
    observation: &[f32],
    params: &UpdateParams,
) -> (Vec<Component>, MatchResult) {
    let outcome = update(&mut components, observation, params);
    (components, outcome.result)
}

fn absorb(components: &mut [Component], index: usize, observation: &[f32], params: &UpdateParams) {
    let alpha = params.alpha;
    for (n, component) in components.iter_mut().enumerate() {
        component.weight *= 1.0 - alpha;
        if n == index {
            component.weight += alpha;
        }
    }

    let matched = &mut components[index];
    let rho = adaptation_rate(matched, observation, params);
    let deviation = matched.squared_distance(observation);
    for (mu, x) in matched.mean.iter_mut().zip(observation) {
        *mu = (1.0 - rho) * *mu + rho * x;
    }
    matched.variance = ((1.0 - rho) * matched.variance + rho * deviation).max(params.min_variance);
}

fn adaptation_rate(component: &Component, observation: &[f32], params: &UpdateParams) -> f32 {
    match params.rho {
        RhoPolicy::Constant => params.alpha,
        RhoPolicy::Density => {
            let rho = params.alpha * component.density(observation);
            if rho.is_finite() {
                rho.clamp(0.0, 1.0)
            } else {
                1.0
            }
        }
    }
}
