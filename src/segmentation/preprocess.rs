use anyhow::{Context, Result};
use image::{imageops, DynamicImage, GrayImage, RgbImage};
use ndarray::{Array3, ArrayView3};

use super::types::{ForegroundMask, Frame, FrameShape};

/// Standard deviation of a 3×3 Gaussian kernel when none is given
/// (`0.3 * ((3 - 1) * 0.5 - 1) + 0.8`).
pub const DEFAULT_BLUR_SIGMA: f32 = 0.8;

/// Converts decoded images into model frames of a fixed shape, and model
/// outputs back into images.
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
    grayscale: bool,
    blur_sigma: Option<f32>,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32, grayscale: bool) -> Self {
        Self {
            target_width,
            target_height,
            grayscale,
            blur_sigma: None,
        }
    }

    /// Smooth every frame with a Gaussian of standard deviation `sigma`
    /// after resizing. Suppresses single-pixel sensor noise before it
    /// reaches the model. Non-positive or non-finite values disable it.
    pub fn with_blur(mut self, sigma: f32) -> Self {
        self.blur_sigma = (sigma.is_finite() && sigma > 0.0).then_some(sigma);
        self
    }

    pub fn blur_sigma(&self) -> Option<f32> {
        self.blur_sigma
    }

    /// Shape of the frames this preprocessor produces.
    pub fn shape(&self) -> FrameShape {
        FrameShape {
            height: self.target_height as usize,
            width: self.target_width as usize,
            channels: if self.grayscale { 1 } else { 3 },
        }
    }

    /// Preprocess an image into an H×W×D frame
    ///
    /// Steps:
    /// 1. Convert to 8-bit luma or RGB
    /// 2. Resize to target dimensions
    /// 3. Gaussian blur, if enabled
    /// 4. Widen to f32, keeping the 0-255 intensity scale
    pub fn preprocess(&self, image: &DynamicImage) -> Result<Frame> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height, channels, raw) = if self.grayscale {
            let resized = self.resize(image.to_luma8());
            let (w, h) = resized.dimensions();
            (w, h, 1, resized.into_raw())
        } else {
            let resized = self.resize(image.to_rgb8());
            let (w, h) = resized.dimensions();
            (w, h, 3, resized.into_raw())
        };

        let values = raw.into_iter().map(f32::from).collect();
        Array3::from_shape_vec((height as usize, width as usize, channels), values)
            .context("Decoded image does not match its own dimensions")
    }

    fn resize<P>(&self, image: image::ImageBuffer<P, Vec<u8>>) -> image::ImageBuffer<P, Vec<u8>>
    where
        P: image::Pixel<Subpixel = u8> + 'static,
    {
        let image = if image.dimensions() == (self.target_width, self.target_height) {
            image
        } else {
            imageops::resize(
                &image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Lanczos3,
            )
        };

        match self.blur_sigma {
            Some(sigma) => imageops::blur(&image, sigma),
            None => image,
        }
    }

    /// Convert mask to a grayscale image (white = foreground)
    pub fn mask_to_gray(mask: &ForegroundMask) -> GrayImage {
        let (height, width) = mask.dim();
        let values = mask.view();
        GrayImage::from_fn(width as u32, height as u32, |x, y| {
            image::Luma([values[[y as usize, x as usize]]])
        })
    }

    /// Convert mask to grayscale RGB image for visualization
    pub fn mask_to_rgb(mask: &ForegroundMask) -> RgbImage {
        let (height, width) = mask.dim();
        let values = mask.view();
        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let value = values[[y as usize, x as usize]];
            image::Rgb([value, value, value])
        })
    }

    /// Convert a frame (1 or 3 channels) to an RGB image, clamping to 0-255.
    pub fn frame_to_rgb(frame: ArrayView3<f32>) -> RgbImage {
        let (height, width, channels) = frame.dim();
        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let (row, col) = (y as usize, x as usize);
            let channel = |c: usize| to_byte(frame[[row, col, c.min(channels - 1)]]);
            image::Rgb([channel(0), channel(1), channel(2)])
        })
    }

    /// Frame pixels where the mask is foreground, black elsewhere.
    pub fn extract_foreground(frame: ArrayView3<f32>, mask: &ForegroundMask) -> RgbImage {
        let mut image = Self::frame_to_rgb(frame);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            if !mask.is_foreground(y as usize, x as usize) {
                *pixel = image::Rgb([0, 0, 0]);
            }
        }
        image
    }
}

fn to_byte(value: f32) -> u8 {
    if value.is_finite() {
        value.round().clamp(0.0, 255.0) as u8
    } else {
        0
    }
}
