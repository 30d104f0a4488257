//! Image-directory input through the pipeline to snapshot output.

use std::path::PathBuf;

use agmm::capture::{FrameSource, ImageSequence};
use agmm::output::{MaskSink, SnapshotWriter};
use agmm::{FramePipeline, MixtureConfig};
use image::{GrayImage, Luma, Rgb, RgbImage};

struct TempDir(PathBuf);

impl TempDir {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("agmm-{name}-{}", std::process::id()));
        std::fs::remove_dir_all(&path).ok();
        std::fs::create_dir_all(&path).unwrap();
        Self(path)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.0).ok();
    }
}

#[test]
fn grayscale_directory_to_snapshots() {
    let input = TempDir::new("seq-input");
    let output = TempDir::new("seq-output");

    // 14 frames of a flat scene; frame 12 has a bright square in one corner.
    for index in 1..=14u32 {
        let image = GrayImage::from_fn(8, 6, |x, y| {
            if index == 12 && x < 2 && y < 2 {
                Luma([250])
            } else {
                Luma([122])
            }
        });
        image
            .save(input.0.join(format!("frame_{index:03}.png")))
            .unwrap();
    }
    std::fs::write(input.0.join("notes.txt"), "not a frame").unwrap();

    let mut source = ImageSequence::open(&input.0, true).unwrap();
    assert_eq!(source.len(), 14);
    assert_eq!(source.resolution(), (8, 6));

    let shape = agmm::FrameShape {
        height: 6,
        width: 8,
        channels: 1,
    };
    let mut pipeline = FramePipeline::new(MixtureConfig::default(), shape).unwrap();
    let mut writer = SnapshotWriter::new(&output.0, 10, true).unwrap();

    let mut index = 0u64;
    let mut counts = Vec::new();
    while let Some(frame) = source.next_frame().unwrap() {
        index += 1;
        let mask = pipeline.process_frame(frame.view()).unwrap();
        counts.push(mask.foreground_count());
        writer.write_mask(index, frame.view(), &mask).unwrap();
    }

    assert_eq!(index, 14);
    assert_eq!(counts[11], 4);
    assert!(counts
        .iter()
        .enumerate()
        .all(|(i, &count)| i == 11 || count == 0));

    // Frames 1 and 11 are due; each writes a mask and a foreground image.
    assert_eq!(writer.written(), 4);
    assert!(writer.mask_path(1).exists());
    assert!(writer.mask_path(11).exists());
    assert!(writer.foreground_path(11).exists());
    assert!(!writer.mask_path(12).exists());

    let saved = image::open(writer.mask_path(11)).unwrap().to_luma8();
    assert_eq!(saved.dimensions(), (8, 6));
    assert!(saved.pixels().all(|p| p[0] == 0));
}

#[test]
fn rgb_frames_keep_three_channels() {
    let input = TempDir::new("seq-rgb");
    for index in 0..3u32 {
        RgbImage::from_pixel(5, 4, Rgb([10, 200, 30]))
            .save(input.0.join(format!("{index}.png")))
            .unwrap();
    }

    let mut source = ImageSequence::open(&input.0, false).unwrap();
    let frame = source.next_frame().unwrap().unwrap();
    assert_eq!(frame.dim(), (4, 5, 3));
    assert_eq!(frame[[3, 4, 1]], 200.0);

    let shape = agmm::FrameShape::of(&frame.view());
    let mut pipeline = FramePipeline::new(MixtureConfig::default(), shape).unwrap();
    pipeline.seed_from_frame(frame.view()).unwrap();
    while let Some(frame) = source.next_frame().unwrap() {
        let mask = pipeline.process_frame(frame.view()).unwrap();
        assert_eq!(mask.foreground_count(), 0);
    }
}

#[test]
fn empty_directory_is_an_error() {
    let input = TempDir::new("seq-empty");
    assert!(ImageSequence::open(&input.0, true).is_err());
}

#[test]
fn blurred_sequence_smooths_isolated_pixels() {
    let input = TempDir::new("seq-blur");
    GrayImage::from_fn(9, 9, |x, y| Luma([if (x, y) == (4, 4) { 255 } else { 0 }]))
        .save(input.0.join("0.png"))
        .unwrap();

    let mut sharp = ImageSequence::open(&input.0, true).unwrap();
    let mut blurred = ImageSequence::open(&input.0, true)
        .unwrap()
        .with_blur(agmm::segmentation::DEFAULT_BLUR_SIGMA);

    let sharp = sharp.next_frame().unwrap().unwrap();
    let blurred = blurred.next_frame().unwrap().unwrap();
    assert_eq!(sharp[[4, 5, 0]], 0.0);
    assert!(blurred[[4, 5, 0]] > 0.0);
    assert!(blurred[[4, 4, 0]] < sharp[[4, 4, 0]]);
}
