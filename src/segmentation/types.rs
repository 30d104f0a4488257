use std::fmt;
use std::ops::{Add, AddAssign};

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

use crate::error::Result;

/// A decoded frame: height × width × channels, row-major, values in the
/// source's intensity scale (0-255 for 8-bit video).
pub type Frame = Array3<f32>;

/// Mask value of a foreground pixel.
pub const FOREGROUND: u8 = 255;
/// Mask value of a background pixel.
pub const BACKGROUND: u8 = 0;

/// Dimensions of a frame, and of the model grid built for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl FrameShape {
    pub fn of(frame: &ArrayView3<f32>) -> Self {
        let (height, width, channels) = frame.dim();
        Self {
            height,
            width,
            channels,
        }
    }

    pub fn pixels(&self) -> usize {
        self.height * self.width
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// Per-frame binary classification: [`FOREGROUND`] or [`BACKGROUND`] per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundMask {
    values: Array2<u8>,
}

impl ForegroundMask {
    pub(crate) fn from_values(values: Array2<u8>) -> Self {
        Self { values }
    }

    /// Height and width.
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn is_foreground(&self, row: usize, col: usize) -> bool {
        self.values[[row, col]] == FOREGROUND
    }

    pub fn foreground_count(&self) -> usize {
        self.values.iter().filter(|&&v| v == FOREGROUND).count()
    }

    /// Fraction of pixels marked foreground.
    pub fn foreground_ratio(&self) -> f64 {
        let total = self.values.len();
        if total == 0 {
            0.0
        } else {
            self.foreground_count() as f64 / total as f64
        }
    }

    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.values.view()
    }

    pub fn into_inner(self) -> Array2<u8> {
        self.values
    }
}

/// What happened while processing one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Pixels marked foreground.
    pub foreground: usize,
    /// Pixels left untouched because the observation was not finite.
    pub skipped: usize,
    /// Pixels whose weakest component was replaced.
    pub replaced: usize,
    /// Pixels whose weights had to be reset to uniform.
    pub degenerate: usize,
}

impl Add for FrameStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            foreground: self.foreground + other.foreground,
            skipped: self.skipped + other.skipped,
            replaced: self.replaced + other.replaced,
            degenerate: self.degenerate + other.degenerate,
        }
    }
}

impl AddAssign for FrameStats {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// Frame-level phase of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    AwaitingFrame,
    Classifying,
    Updating,
    MaskReady,
}

/// Trait for background subtractors
/// Allows swapping the mixture pipeline for other per-pixel models
pub trait BackgroundSubtractor {
    /// Process a frame and return its foreground mask
    ///
    /// # Arguments
    /// * `frame` - Input frame, height × width × channels
    ///
    /// # Returns
    /// * Mask with [`FOREGROUND`]/[`BACKGROUND`] per pixel, same height and width
    fn segment(&mut self, frame: ArrayView3<f32>) -> Result<ForegroundMask>;

    /// Reset learned state
    ///
    /// Call this when:
    /// - Switching cameras
    /// - Scene cuts detected
    /// - Starting a new video session
    fn reset_state(&mut self);

    /// Frame dimensions the subtractor was built for
    fn input_shape(&self) -> FrameShape;
}
