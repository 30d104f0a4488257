use agmm::capture::{FrameSource, ImageSequence};
use agmm::output::{MaskSink, SnapshotWriter};
use agmm::segmentation::{FramePipeline, FrameShape, Preprocessor};
use agmm::{ClassificationOrder, MixtureConfig, RhoPolicy};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of input frames (png, jpg, bmp, tiff, pnm), read in file name order
    input: Option<PathBuf>,

    /// Capture from this webcam index instead of an image directory
    #[cfg(feature = "webcam")]
    #[arg(long)]
    device: Option<u32>,

    /// Capture resolution width (webcam only)
    #[cfg(feature = "webcam")]
    #[arg(long, default_value_t = 640)]
    capture_width: u32,

    /// Capture resolution height (webcam only)
    #[cfg(feature = "webcam")]
    #[arg(long, default_value_t = 480)]
    capture_height: u32,

    /// Also stream masks to this v4l2loopback device
    #[cfg(feature = "webcam")]
    #[arg(long)]
    loopback: Option<PathBuf>,

    /// Directory for mask snapshots
    #[arg(short, long, default_value = "masks")]
    output_dir: PathBuf,

    /// Save a snapshot every N frames
    #[arg(long, default_value_t = 10)]
    snapshot_every: u64,

    /// Also save the frame pixels classified as foreground
    #[arg(long)]
    write_foreground: bool,

    /// Save the background estimate to this image when the stream ends
    #[arg(long)]
    background_out: Option<PathBuf>,

    /// Model luma only instead of RGB
    #[arg(long)]
    grayscale: bool,

    /// Gaussian-blur input frames before modelling; the optional value is
    /// the kernel sigma (defaults to a 3x3 kernel's 0.8)
    #[arg(long, value_name = "SIGMA", num_args = 0..=1, default_missing_value = "0.8")]
    blur: Option<f32>,

    /// Gaussian components per pixel (K)
    #[arg(short = 'k', long, default_value_t = 3)]
    components: usize,

    /// Adaptation rate
    #[arg(long, default_value_t = 0.01)]
    alpha: f32,

    /// Match distance in standard deviations
    #[arg(long, default_value_t = 2.5)]
    t_sigma: f32,

    /// Cumulative weight covered by the background set
    #[arg(long, default_value_t = 0.8)]
    beta: f32,

    /// Variance of a component seeded by replacement
    #[arg(long, default_value_t = 100.0)]
    replacement_variance: f32,

    /// Weight of a component seeded by replacement
    #[arg(long, default_value_t = 0.05)]
    replacement_weight: f32,

    /// Prior mean of every component
    #[arg(long, default_value_t = 122.0)]
    initial_mean: f32,

    /// Prior variance of every component
    #[arg(long, default_value_t = 36.0)]
    initial_variance: f32,

    /// Variance floor for matched components (0 disables)
    #[arg(long, default_value_t = 0.0)]
    min_variance: f32,

    /// Mean/variance adaptation rate rule
    #[arg(long, value_enum, default_value_t = RhoArg::Constant)]
    rho: RhoArg,

    /// When the background set is computed relative to the update
    #[arg(long, value_enum, default_value_t = OrderArg::BeforeUpdate)]
    order: OrderArg,

    /// Centre the model on the first frame instead of the neutral prior
    #[arg(long)]
    seed_first_frame: bool,

    /// Worker threads (defaults to one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Target frames per second (0 = as fast as possible)
    #[arg(long, default_value_t = 0)]
    fps: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RhoArg {
    /// rho = alpha
    Constant,
    /// rho = alpha times the matched Gaussian's density
    Density,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OrderArg {
    BeforeUpdate,
    AfterUpdate,
}

impl Args {
    fn mixture_config(&self) -> MixtureConfig {
        MixtureConfig {
            components: self.components,
            alpha: self.alpha,
            t_sigma: self.t_sigma,
            beta: self.beta,
            replacement_variance: self.replacement_variance,
            replacement_weight: self.replacement_weight,
            initial_mean: self.initial_mean,
            initial_variance: self.initial_variance,
            min_variance: self.min_variance,
            rho: match self.rho {
                RhoArg::Constant => RhoPolicy::Constant,
                RhoArg::Density => RhoPolicy::Density,
            },
            order: match self.order {
                OrderArg::BeforeUpdate => ClassificationOrder::BeforeUpdate,
                OrderArg::AfterUpdate => ClassificationOrder::AfterUpdate,
            },
        }
    }

    #[cfg(feature = "webcam")]
    fn open_source(&self) -> Result<Box<dyn FrameSource>> {
        if let Some(device) = self.device {
            let capture = agmm::capture::WebcamCapture::new(
                device,
                self.capture_width,
                self.capture_height,
                self.grayscale,
            )
            .context("Failed to initialize webcam capture")?;
            let capture = match self.blur {
                Some(sigma) => capture.with_blur(sigma),
                None => capture,
            };
            return Ok(Box::new(capture));
        }
        self.open_sequence()
    }

    #[cfg(not(feature = "webcam"))]
    fn open_source(&self) -> Result<Box<dyn FrameSource>> {
        self.open_sequence()
    }

    fn open_sequence(&self) -> Result<Box<dyn FrameSource>> {
        let dir = self
            .input
            .as_ref()
            .context("An input frame directory is required")?;
        let sequence = ImageSequence::open(dir, self.grayscale)
            .context("Failed to open input image sequence")?;
        let sequence = match self.blur {
            Some(sigma) => sequence.with_blur(sigma),
            None => sequence,
        };
        Ok(Box::new(sequence))
    }

    fn open_sinks(&self) -> Result<Vec<Box<dyn MaskSink>>> {
        let mut sinks: Vec<Box<dyn MaskSink>> = vec![Box::new(
            SnapshotWriter::new(&self.output_dir, self.snapshot_every, self.write_foreground)
                .context("Failed to initialize snapshot output")?,
        )];

        #[cfg(feature = "webcam")]
        if let Some(device) = &self.loopback {
            let (width, height) = (self.capture_width, self.capture_height);
            let output =
                agmm::output::V4L2Output::new(device, width, height, self.write_foreground)
                    .context("Failed to initialize v4l2loopback output")?;
            sinks.push(Box::new(output));
        }

        Ok(sinks)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("agmm starting");

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker threads")?;
        tracing::info!("Using {} worker threads", threads);
    }

    let mut source = args.open_source()?;
    let (width, height) = source.resolution();
    let shape = FrameShape {
        height: height as usize,
        width: width as usize,
        channels: if args.grayscale { 1 } else { 3 },
    };
    tracing::info!("Input: {}x{}", width, height);
    if let Some(sigma) = args.blur {
        tracing::info!("Blurring input frames (sigma {})", sigma);
    }

    let mut pipeline = FramePipeline::new(args.mixture_config(), shape)
        .context("Failed to build background model")?;
    let mut sinks = args.open_sinks()?;

    run_pipeline(
        source.as_mut(),
        &mut pipeline,
        &mut sinks,
        &RunOptions {
            seed_first_frame: args.seed_first_frame,
            max_frames: args.max_frames,
            fps: args.fps,
        },
    )?;

    if let Some(path) = &args.background_out {
        let estimate = pipeline.model().background_estimate();
        Preprocessor::frame_to_rgb(estimate.view())
            .save(path)
            .with_context(|| format!("Failed to write background estimate {}", path.display()))?;
        tracing::info!("Background estimate saved to {}", path.display());
    }

    Ok(())
}

struct RunOptions {
    seed_first_frame: bool,
    max_frames: Option<u64>,
    fps: u32,
}

fn run_pipeline(
    source: &mut dyn FrameSource,
    pipeline: &mut FramePipeline,
    sinks: &mut [Box<dyn MaskSink>],
    options: &RunOptions,
) -> Result<()> {
    let frame_duration = (options.fps > 0).then(|| Duration::from_secs_f32(1.0 / options.fps as f32));
    let mut frame_count = 0u64;
    let mut foreground_pixels = 0usize;
    let mut total_capture_time = Duration::ZERO;
    let mut total_segment_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;

    tracing::info!("Starting main pipeline loop");

    loop {
        if options.max_frames.is_some_and(|max| frame_count >= max) {
            tracing::info!("Reached frame limit");
            break;
        }

        let loop_start = Instant::now();

        // Capture frame
        let capture_start = Instant::now();
        let Some(frame) = source.next_frame().context("Failed to capture frame")? else {
            tracing::info!("End of stream");
            break;
        };
        total_capture_time += capture_start.elapsed();

        if frame_count == 0 && options.seed_first_frame {
            pipeline
                .seed_from_frame(frame.view())
                .context("Failed to seed background model")?;
        }

        // Segmentation
        let segment_start = Instant::now();
        let mask = pipeline
            .process_frame(frame.view())
            .context("Failed to segment frame")?;
        total_segment_time += segment_start.elapsed();

        frame_count += 1;
        foreground_pixels += mask.foreground_count();

        // Output mask
        let output_start = Instant::now();
        for sink in sinks.iter_mut() {
            sink.write_mask(frame_count, frame.view(), &mask)
                .context("Failed to write mask")?;
        }
        total_output_time += output_start.elapsed();

        // Log stats every 30 frames
        if frame_count % 30 == 0 {
            log_progress(
                frame_count,
                total_capture_time,
                total_segment_time,
                total_output_time,
                mask.foreground_ratio(),
            );
        }

        // Frame rate limiting
        if let Some(frame_duration) = frame_duration {
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }

    let pixels = pipeline.model().shape().pixels() as f64;
    let mean_ratio = if frame_count > 0 {
        foreground_pixels as f64 / (pixels * frame_count as f64)
    } else {
        0.0
    };
    tracing::info!(
        "Processed {} frames, mean foreground ratio {:.3}",
        frame_count,
        mean_ratio
    );
    Ok(())
}

fn log_progress(
    frame_count: u64,
    capture: Duration,
    segment: Duration,
    output: Duration,
    foreground_ratio: f64,
) {
    let avg_ms = |total: Duration| total.as_secs_f64() * 1000.0 / frame_count as f64;
    let (capture_ms, segment_ms, output_ms) = (avg_ms(capture), avg_ms(segment), avg_ms(output));
    let total_ms = capture_ms + segment_ms + output_ms;

    tracing::info!(
        "Frame {}: capture={:.1}ms, segment={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}, foreground={:.1}%",
        frame_count,
        capture_ms,
        segment_ms,
        output_ms,
        total_ms,
        1000.0 / total_ms,
        foreground_ratio * 100.0
    );
}
