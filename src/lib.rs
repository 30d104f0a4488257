//! Per-pixel adaptive Gaussian mixture background subtraction.
//!
//! Every pixel keeps a small mixture of Gaussians describing how it has
//! looked over time. Each frame, the [`FramePipeline`] ranks a pixel's
//! components by confidence, matches the new observation against them,
//! updates or replaces a component, and marks the pixel foreground when the
//! observation is not explained by its background set.
//!
//! Frame decoding and mask display are left to collaborators; [`capture`]
//! and [`output`] hold thin adapters for image sequences, snapshots and (with
//! the `webcam` feature) live cameras and v4l2loopback devices.

pub mod capture;
pub mod config;
pub mod error;
pub mod mixture;
pub mod output;
pub mod segmentation;

pub use config::{ClassificationOrder, MixtureConfig, RhoPolicy};
pub use error::{AgmmError, ConfigError, Result};
pub use mixture::{BackgroundModel, Component, MatchResult};
pub use segmentation::{
    BackgroundSubtractor, ForegroundMask, Frame, FramePipeline, FrameShape, FrameStats,
    PipelineState,
};
