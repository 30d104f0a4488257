//! Typed errors for the mixture model and frame pipeline.
//!
//! Library code returns [`AgmmError`]; the binary and the I/O collaborators
//! wrap these in `anyhow::Result` at their call sites.

use crate::segmentation::types::FrameShape;

/// Rejected configuration. Raised only at construction time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("component count must be between 1 and {max}, got {value}")]
    ComponentCount { value: usize, max: usize },

    #[error("alpha must lie in [0, 1], got {0}")]
    Alpha(f32),

    #[error("beta must lie in (0, 1], got {0}")]
    Beta(f32),

    #[error("replacement weight must lie in (0, 1], got {0}")]
    ReplacementWeight(f32),

    #[error("{name} must be finite and positive, got {value}")]
    NotPositive { name: &'static str, value: f32 },

    #[error("{name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f32 },

    #[error("minimum variance must be finite and non-negative, got {0}")]
    MinVariance(f32),

    #[error("frame dimensions must be non-zero, got {height}x{width}")]
    EmptyFrame { height: usize, width: usize },
}

/// All errors originating from the background subtraction engine.
#[derive(Debug, thiserror::Error)]
pub enum AgmmError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: FrameShape,
        actual: FrameShape,
    },

    #[error("unsupported channel count {0} (expected 1 to {max})", max = crate::mixture::MAX_CHANNELS)]
    UnsupportedChannels(usize),

    #[error("frame processing cancelled")]
    Cancelled,

    #[error("no foreground mask is ready; submit a frame first")]
    NoMaskReady,

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, AgmmError>;
