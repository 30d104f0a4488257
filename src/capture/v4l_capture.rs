use super::FrameSource;
use crate::segmentation::{Frame, Preprocessor};
use anyhow::{Context, Result};
use image::DynamicImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

/// Live camera frames, resized to the requested resolution.
pub struct WebcamCapture {
    camera: Camera,
    preprocessor: Preprocessor,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    pub fn new(device_index: u32, width: u32, height: u32, grayscale: bool) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} at {}x{}",
            device_index,
            width,
            height
        );

        let index = CameraIndex::Index(device_index);
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = Camera::new(index, requested).context("Failed to open camera")?;

        camera
            .open_stream()
            .context("Failed to open camera stream")?;

        tracing::info!("Webcam initialized successfully");

        Ok(Self {
            camera,
            preprocessor: Preprocessor::new(width, height, grayscale),
            width,
            height,
        })
    }

    pub fn with_blur(mut self, sigma: f32) -> Self {
        self.preprocessor = self.preprocessor.with_blur(sigma);
        self
    }
}

impl FrameSource for WebcamCapture {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let buffer = self.camera.frame().context("Failed to capture frame")?;

        let decoded = buffer
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        self.preprocessor
            .preprocess(&DynamicImage::ImageRgb8(decoded))
            .map(Some)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
