mod pipeline;
mod preprocess;
pub mod types;

pub use pipeline::FramePipeline;
pub use preprocess::{Preprocessor, DEFAULT_BLUR_SIGMA};
pub use types::{
    BackgroundSubtractor, ForegroundMask, Frame, FrameShape, FrameStats, PipelineState,
    BACKGROUND, FOREGROUND,
};

use crate::config::MixtureConfig;
use crate::error::Result;

/// Create the default background subtractor (adaptive Gaussian mixture)
pub fn create_default_subtractor(
    config: MixtureConfig,
    shape: FrameShape,
) -> Result<Box<dyn BackgroundSubtractor>> {
    let pipeline = FramePipeline::new(config, shape)?;
    Ok(Box::new(pipeline))
}
