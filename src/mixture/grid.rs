use ndarray::{Array3, ArrayView3};

use super::component::{seed_prior, Component};
use super::rank::Ranking;
use super::MAX_CHANNELS;
use crate::config::MixtureConfig;
use crate::error::{AgmmError, ConfigError, Result};
use crate::segmentation::types::FrameShape;

/// Height × width grid of per-pixel mixtures.
///
/// All components live in one preallocated arena, `components_per_pixel`
/// consecutive entries per pixel, pixels in row-major order.
pub struct BackgroundModel {
    shape: FrameShape,
    components_per_pixel: usize,
    initial_mean: f32,
    initial_variance: f32,
    components: Vec<Component>,
}

impl BackgroundModel {
    /// Builds the grid with every component set to the neutral prior.
    pub fn new(config: &MixtureConfig, shape: FrameShape) -> Result<Self> {
        config.validate()?;
        if shape.height == 0 || shape.width == 0 {
            return Err(ConfigError::EmptyFrame {
                height: shape.height,
                width: shape.width,
            }
            .into());
        }
        if shape.channels == 0 || shape.channels > MAX_CHANNELS {
            return Err(AgmmError::UnsupportedChannels(shape.channels));
        }

        let k = config.components;
        let prior = Component::uniform(
            config.initial_mean,
            shape.channels,
            config.initial_variance,
            config.uniform_weight(),
        );
        let components = vec![prior; shape.height * shape.width * k];

        tracing::info!(
            "Background model: {}x{}x{} pixels, {} components each ({} total)",
            shape.height,
            shape.width,
            shape.channels,
            k,
            components.len()
        );

        Ok(Self {
            shape,
            components_per_pixel: k,
            initial_mean: config.initial_mean,
            initial_variance: config.initial_variance,
            components,
        })
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn components_per_pixel(&self) -> usize {
        self.components_per_pixel
    }

    /// Components of the pixel at (`row`, `col`).
    ///
    /// # Panics
    /// If the position lies outside the grid.
    pub fn pixel(&self, row: usize, col: usize) -> &[Component] {
        let start = self.offset(row, col);
        &self.components[start..start + self.components_per_pixel]
    }

    pub fn pixel_mut(&mut self, row: usize, col: usize) -> &mut [Component] {
        let start = self.offset(row, col);
        &mut self.components[start..start + self.components_per_pixel]
    }

    /// Iterates over every pixel's components in row-major order.
    pub fn pixels(&self) -> std::slice::Chunks<'_, Component> {
        self.components.chunks(self.components_per_pixel)
    }

    /// The whole arena, for row-sliced parallel passes.
    pub(crate) fn arena(&self) -> &[Component] {
        &self.components
    }

    pub(crate) fn arena_mut(&mut self) -> &mut [Component] {
        &mut self.components
    }

    /// Components in one full row of pixels.
    pub(crate) fn row_len(&self) -> usize {
        self.shape.width * self.components_per_pixel
    }

    /// Reseeds every pixel to the neutral prior.
    pub fn reset(&mut self) {
        let (k, channels) = (self.components_per_pixel, self.shape.channels);
        for pixel in self.components.chunks_mut(k) {
            seed_prior(pixel, channels, self.initial_mean, self.initial_variance);
        }
    }

    /// Centres every component of every pixel on that pixel's value in
    /// `frame`, keeping the prior variance and uniform weights.
    pub fn seed_from_frame(&mut self, frame: ArrayView3<f32>) -> Result<()> {
        let actual = FrameShape::of(&frame);
        if actual != self.shape {
            return Err(AgmmError::DimensionMismatch {
                expected: self.shape,
                actual,
            });
        }

        let (k, channels) = (self.components_per_pixel, self.shape.channels);
        let weight = 1.0 / k as f32;
        let mut observation = [0.0; MAX_CHANNELS];
        for row in 0..self.shape.height {
            for col in 0..self.shape.width {
                for (channel, value) in observation[..channels].iter_mut().enumerate() {
                    *value = frame[[row, col, channel]];
                }
                let observation = &observation[..channels];
                if !observation.iter().all(|v| v.is_finite()) {
                    continue;
                }
                let start = self.offset(row, col);
                let seeded = Component::seeded(observation, self.initial_variance, weight);
                self.components[start..start + k].fill(seeded);
            }
        }
        Ok(())
    }

    /// Per-pixel mean of the most confident component.
    pub fn background_estimate(&self) -> Array3<f32> {
        let FrameShape {
            height,
            width,
            channels,
        } = self.shape;
        let mut estimate = Array3::<f32>::zeros((height, width, channels));
        for (index, pixel) in self.pixels().enumerate() {
            let strongest = &pixel[Ranking::compute(pixel, 1.0).strongest()];
            let (row, col) = (index / width, index % width);
            for channel in 0..channels {
                estimate[[row, col, channel]] = strongest.mean[channel];
            }
        }
        estimate
    }

    fn offset(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.shape.height && col < self.shape.width,
            "pixel ({row}, {col}) outside {}x{} grid",
            self.shape.height,
            self.shape.width
        );
        (row * self.shape.width + col) * self.components_per_pixel
    }
}
