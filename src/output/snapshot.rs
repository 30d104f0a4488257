use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::ArrayView3;

use super::MaskSink;
use crate::segmentation::{ForegroundMask, Preprocessor};

/// Saves every `every`-th mask as a PNG, starting with the first frame.
pub struct SnapshotWriter {
    dir: PathBuf,
    every: u64,
    with_foreground: bool,
    written: usize,
}

impl SnapshotWriter {
    pub fn new<P: AsRef<Path>>(dir: P, every: u64, with_foreground: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot directory {}", dir.display()))?;

        tracing::info!(
            "Writing snapshots every {} frames to {}",
            every.max(1),
            dir.display()
        );

        Ok(Self {
            dir,
            every: every.max(1),
            with_foreground,
            written: 0,
        })
    }

    /// Number of snapshot files written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn mask_path(&self, frame_index: u64) -> PathBuf {
        self.dir.join(format!("mask_{frame_index:06}.png"))
    }

    pub fn foreground_path(&self, frame_index: u64) -> PathBuf {
        self.dir.join(format!("foreground_{frame_index:06}.png"))
    }

    fn is_due(&self, frame_index: u64) -> bool {
        frame_index > 0 && (frame_index - 1) % self.every == 0
    }
}

impl MaskSink for SnapshotWriter {
    fn write_mask(
        &mut self,
        frame_index: u64,
        frame: ArrayView3<f32>,
        mask: &ForegroundMask,
    ) -> Result<()> {
        if !self.is_due(frame_index) {
            return Ok(());
        }

        let path = self.mask_path(frame_index);
        Preprocessor::mask_to_gray(mask)
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        self.written += 1;

        if self.with_foreground {
            let path = self.foreground_path(frame_index);
            Preprocessor::extract_foreground(frame, mask)
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            self.written += 1;
        }

        tracing::debug!("Snapshot of frame {} saved", frame_index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_on_first_frame_then_every_nth() {
        let dir = std::env::temp_dir().join(format!("agmm-snapshot-due-{}", std::process::id()));
        let writer = SnapshotWriter::new(&dir, 10, false).unwrap();
        let due: Vec<u64> = (1..=25).filter(|&i| writer.is_due(i)).collect();
        assert_eq!(due, vec![1, 11, 21]);
        assert!(!writer.is_due(0));
        std::fs::remove_dir_all(&dir).ok();
    }
}
