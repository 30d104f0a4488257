mod image_sequence;
#[cfg(feature = "webcam")]
mod v4l_capture;

pub use image_sequence::ImageSequence;
#[cfg(feature = "webcam")]
pub use v4l_capture::WebcamCapture;

use anyhow::Result;

use crate::segmentation::Frame;

/// Trait for frame sources
pub trait FrameSource {
    /// Next frame, or `None` once the stream has ended
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Get the resolution of produced frames as (width, height)
    fn resolution(&self) -> (u32, u32);
}
