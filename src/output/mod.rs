#[cfg(feature = "webcam")]
mod loopback;
mod snapshot;

#[cfg(feature = "webcam")]
pub use loopback::V4L2Output;
pub use snapshot::SnapshotWriter;

use anyhow::Result;
use ndarray::ArrayView3;

use crate::segmentation::ForegroundMask;

/// Trait for mask consumers (display, recording, persistence)
pub trait MaskSink {
    /// Consume the mask computed for `frame`, the `frame_index`-th frame of
    /// the stream (1-based)
    fn write_mask(
        &mut self,
        frame_index: u64,
        frame: ArrayView3<f32>,
        mask: &ForegroundMask,
    ) -> Result<()>;
}
