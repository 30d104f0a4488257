//! Per-pixel adaptive Gaussian mixture: the component store, the match and
//! update engine, the confidence ranking, and the pixel grid that holds them.

pub mod component;
pub mod grid;
pub mod rank;
pub mod update;

pub use component::{Component, Renormalization};
pub use grid::BackgroundModel;
pub use rank::{BackgroundSet, Ranking};
pub use update::{find_match, update, updated, MatchResult, PixelUpdate, UpdateParams};

/// Largest supported channel count per observation (RGB).
pub const MAX_CHANNELS: usize = 3;

/// Largest supported component count per pixel.
pub const MAX_COMPONENTS: usize = 16;
