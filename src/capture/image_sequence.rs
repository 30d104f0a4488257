use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use super::FrameSource;
use crate::segmentation::{Frame, Preprocessor};

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm", "ppm"];

/// Frames decoded from a directory of still images, in file name order.
///
/// The resolution is taken from the first image; later images of another
/// size are resized to it.
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    next: usize,
    preprocessor: Preprocessor,
    width: u32,
    height: u32,
}

impl ImageSequence {
    pub fn open<P: AsRef<Path>>(dir: P, grayscale: bool) -> Result<Self> {
        let dir = dir.as_ref();
        tracing::info!("Opening image sequence in {}", dir.display());

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read frame directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let Some(first) = paths.first() else {
            bail!("No image files found in {}", dir.display());
        };
        let (width, height) = image::image_dimensions(first)
            .with_context(|| format!("Failed to read dimensions of {}", first.display()))?;

        tracing::info!(
            "Found {} frames at {}x{} ({})",
            paths.len(),
            width,
            height,
            if grayscale { "grayscale" } else { "rgb" }
        );

        Ok(Self {
            paths,
            next: 0,
            preprocessor: Preprocessor::new(width, height, grayscale),
            width,
            height,
        })
    }

    /// Gaussian-blur every decoded frame; see [`Preprocessor::with_blur`].
    pub fn with_blur(mut self, sigma: f32) -> Self {
        self.preprocessor = self.preprocessor.with_blur(sigma);
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let decoded =
            image::open(path).with_context(|| format!("Failed to decode {}", path.display()))?;
        self.preprocessor.preprocess(&decoded).map(Some)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
