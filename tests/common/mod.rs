#![allow(dead_code)]

use agmm::{Component, FramePipeline, FrameShape, MixtureConfig};
use ndarray::Array3;

/// Small deterministic generator so noisy-frame tests are reproducible.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform in `[low, high)`.
    pub fn uniform(&mut self, low: f32, high: f32) -> f32 {
        let unit = (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32;
        low + unit * (high - low)
    }
}

pub fn shape(height: usize, width: usize, channels: usize) -> FrameShape {
    FrameShape {
        height,
        width,
        channels,
    }
}

pub fn constant_frame(shape: FrameShape, value: f32) -> Array3<f32> {
    Array3::from_elem((shape.height, shape.width, shape.channels), value)
}

pub fn noisy_frame(shape: FrameShape, rng: &mut XorShift, low: f32, high: f32) -> Array3<f32> {
    Array3::from_shape_fn((shape.height, shape.width, shape.channels), |_| {
        rng.uniform(low, high)
    })
}

pub fn pipeline(config: MixtureConfig, shape: FrameShape) -> FramePipeline {
    FramePipeline::new(config, shape).expect("valid pipeline")
}

/// Copy of every component in the model, pixel-major.
pub fn snapshot(pipeline: &FramePipeline) -> Vec<Component> {
    pipeline.model().pixels().flatten().copied().collect()
}

pub fn weight_sum(components: &[Component]) -> f32 {
    components.iter().map(|c| c.weight).sum()
}
