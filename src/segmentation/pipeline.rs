use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::{Array2, ArrayView3};
use rayon::prelude::*;

use super::types::{
    BackgroundSubtractor, ForegroundMask, FrameShape, FrameStats, PipelineState, BACKGROUND,
    FOREGROUND,
};
use crate::config::{ClassificationOrder, MixtureConfig};
use crate::error::{AgmmError, Result};
use crate::mixture::{
    update, BackgroundModel, BackgroundSet, Component, MatchResult, Ranking, Renormalization,
    UpdateParams,
};

/// What the update pass did with one pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum PixelOutcome {
    /// Non-finite observation; the store was left alone.
    #[default]
    Skipped,
    Matched(u8),
    Replaced,
}

/// Adaptive Gaussian mixture background subtraction over whole frames.
///
/// Owns the [`BackgroundModel`] and drives every pixel through ranking and
/// match/update, one frame at a time. Rows are processed in parallel; each
/// worker owns a disjoint row range of the model and of the scratch buffers.
pub struct FramePipeline {
    config: MixtureConfig,
    params: UpdateParams,
    model: BackgroundModel,
    state: PipelineState,
    background_sets: Vec<BackgroundSet>,
    outcomes: Vec<PixelOutcome>,
    mask: Option<ForegroundMask>,
    frames_processed: u64,
    stop: Option<Arc<AtomicBool>>,
}

impl FramePipeline {
    /// Validates `config` and builds a model grid for frames of `shape`.
    pub fn new(config: MixtureConfig, shape: FrameShape) -> Result<Self> {
        let model = BackgroundModel::new(&config, shape)?;
        let pixels = shape.pixels();

        tracing::info!(
            "Mixture pipeline: alpha={}, t_sigma={}, beta={}, rho={:?}, order={:?}",
            config.alpha,
            config.t_sigma,
            config.beta,
            config.rho,
            config.order
        );

        Ok(Self {
            params: UpdateParams::from(&config),
            config,
            model,
            state: PipelineState::AwaitingFrame,
            background_sets: vec![BackgroundSet::default(); pixels],
            outcomes: vec![PixelOutcome::default(); pixels],
            mask: None,
            frames_processed: 0,
            stop: None,
        })
    }

    /// Shares a stop flag with the frame source. Once it is set, the frame
    /// in flight is abandoned at the next row boundary.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn config(&self) -> &MixtureConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn model(&self) -> &BackgroundModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut BackgroundModel {
        &mut self.model
    }

    /// Centres the whole model on `frame` instead of the neutral prior.
    pub fn seed_from_frame(&mut self, frame: ArrayView3<f32>) -> Result<()> {
        self.model.seed_from_frame(frame)?;
        tracing::info!("Background model seeded from frame");
        Ok(())
    }

    /// Classifies and learns from one frame, leaving its mask ready for
    /// [`take_mask`](Self::take_mask).
    ///
    /// A frame whose shape differs from the model fails before anything is
    /// touched.
    ///
    /// Cancellation does not roll back. A cancelled frame yields no mask and
    /// leaves the model partly advanced: rows updated before the stop flag
    /// was seen keep this frame's observation, the remaining rows do not.
    /// Every pixel store is still normalized and usable for the next frame.
    pub fn submit(&mut self, frame: ArrayView3<f32>) -> Result<FrameStats> {
        let expected = self.model.shape();
        let actual = FrameShape::of(&frame);
        if actual != expected {
            return Err(AgmmError::DimensionMismatch { expected, actual });
        }

        if self.mask.take().is_some() {
            tracing::debug!("Discarding unclaimed mask of frame {}", self.frames_processed);
        }

        let observations: Cow<'_, [f32]> = match frame.as_slice() {
            Some(values) => Cow::Borrowed(values),
            None => Cow::Owned(frame.iter().copied().collect()),
        };

        match self.run_passes(&observations) {
            Ok(stats) => {
                self.frames_processed += 1;
                tracing::debug!(
                    "Frame {}: foreground={}, replaced={}, skipped={}, degenerate={}",
                    self.frames_processed,
                    stats.foreground,
                    stats.replaced,
                    stats.skipped,
                    stats.degenerate
                );
                Ok(stats)
            }
            Err(err) => {
                self.state = PipelineState::AwaitingFrame;
                Err(err)
            }
        }
    }

    /// Hands off the mask of the last submitted frame.
    pub fn take_mask(&mut self) -> Result<ForegroundMask> {
        if self.state != PipelineState::MaskReady {
            return Err(AgmmError::NoMaskReady);
        }
        let mask = self.mask.take().ok_or(AgmmError::NoMaskReady)?;
        self.state = PipelineState::AwaitingFrame;
        Ok(mask)
    }

    /// [`submit`](Self::submit) followed by [`take_mask`](Self::take_mask).
    pub fn process_frame(&mut self, frame: ArrayView3<f32>) -> Result<ForegroundMask> {
        self.submit(frame)?;
        self.take_mask()
    }

    fn run_passes(&mut self, observations: &[f32]) -> Result<FrameStats> {
        let mut stats = match self.config.order {
            ClassificationOrder::BeforeUpdate => {
                self.classify()?;
                self.learn(observations)?
            }
            ClassificationOrder::AfterUpdate => {
                let stats = self.learn(observations)?;
                self.classify()?;
                stats
            }
        };

        let mask = self.emit_mask()?;
        stats.foreground = mask.foreground_count();
        self.mask = Some(mask);
        self.state = PipelineState::MaskReady;
        Ok(stats)
    }

    /// Computes every pixel's background set from the current model.
    fn classify(&mut self) -> Result<()> {
        let _span = tracing::debug_span!("classify").entered();
        self.state = PipelineState::Classifying;

        let width = self.model.shape().width;
        let k = self.model.components_per_pixel();
        let row_len = self.model.row_len();
        let beta = self.config.beta;
        let stop = self.stop.as_deref();

        self.background_sets
            .par_chunks_mut(width)
            .zip(self.model.arena().par_chunks(row_len))
            .try_for_each(|(sets, row)| {
                check_stop(stop)?;
                for (set, pixel) in sets.iter_mut().zip(row.chunks(k)) {
                    *set = Ranking::compute(pixel, beta).background_set();
                }
                Ok(())
            })
    }

    /// Matches and updates every pixel against its observation.
    fn learn(&mut self, observations: &[f32]) -> Result<FrameStats> {
        let _span = tracing::debug_span!("update").entered();
        self.state = PipelineState::Updating;

        let shape = self.model.shape();
        let k = self.model.components_per_pixel();
        let row_len = self.model.row_len();
        let params = self.params;
        let stop = self.stop.as_deref();

        self.model
            .arena_mut()
            .par_chunks_mut(row_len)
            .zip(self.outcomes.par_chunks_mut(shape.width))
            .zip(observations.par_chunks(shape.width * shape.channels))
            .map(|((row, outcomes), pixels)| {
                check_stop(stop)?;
                let mut stats = FrameStats::default();
                for ((components, outcome), observation) in row
                    .chunks_mut(k)
                    .zip(outcomes.iter_mut())
                    .zip(pixels.chunks(shape.channels))
                {
                    *outcome = observe(components, observation, &params, &mut stats);
                }
                Ok(stats)
            })
            .try_reduce(FrameStats::default, |a, b| Ok(a + b))
    }

    fn emit_mask(&self) -> Result<ForegroundMask> {
        let shape = self.model.shape();
        let values: Vec<u8> = self
            .outcomes
            .par_iter()
            .zip(self.background_sets.par_iter())
            .map(|(&outcome, &set)| decide(outcome, set))
            .collect();
        let values = Array2::from_shape_vec((shape.height, shape.width), values)?;
        Ok(ForegroundMask::from_values(values))
    }
}

impl BackgroundSubtractor for FramePipeline {
    fn segment(&mut self, frame: ArrayView3<f32>) -> Result<ForegroundMask> {
        self.process_frame(frame)
    }

    fn reset_state(&mut self) {
        tracing::info!("Resetting background model to the neutral prior");
        self.model.reset();
        self.mask = None;
        self.state = PipelineState::AwaitingFrame;
    }

    fn input_shape(&self) -> FrameShape {
        self.model.shape()
    }
}

fn check_stop(stop: Option<&AtomicBool>) -> Result<()> {
    match stop {
        Some(flag) if flag.load(Ordering::Relaxed) => Err(AgmmError::Cancelled),
        _ => Ok(()),
    }
}

fn observe(
    components: &mut [Component],
    observation: &[f32],
    params: &UpdateParams,
    stats: &mut FrameStats,
) -> PixelOutcome {
    if !observation.iter().all(|v| v.is_finite()) {
        stats.skipped += 1;
        return PixelOutcome::Skipped;
    }

    let update = update(components, observation, params);
    if update.renormalization == Renormalization::Degenerate {
        tracing::trace!("Weight sum degenerate, reset to uniform");
        stats.degenerate += 1;
    }
    match update.result {
        MatchResult::Matched(index) => PixelOutcome::Matched(index as u8),
        MatchResult::Unmatched => {
            stats.replaced += 1;
            PixelOutcome::Replaced
        }
    }
}

fn decide(outcome: PixelOutcome, background: BackgroundSet) -> u8 {
    match outcome {
        PixelOutcome::Skipped => BACKGROUND,
        PixelOutcome::Replaced => FOREGROUND,
        PixelOutcome::Matched(index) if background.contains(index as usize) => BACKGROUND,
        PixelOutcome::Matched(_) => FOREGROUND,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn gray_shape(height: usize, width: usize) -> FrameShape {
        FrameShape {
            height,
            width,
            channels: 1,
        }
    }

    fn constant(height: usize, width: usize, value: f32) -> Array3<f32> {
        Array3::from_elem((height, width, 1), value)
    }

    #[test]
    fn state_cycles_through_mask_ready() {
        let mut pipeline = FramePipeline::new(MixtureConfig::default(), gray_shape(2, 2)).unwrap();
        assert_eq!(pipeline.state(), PipelineState::AwaitingFrame);

        pipeline.submit(constant(2, 2, 122.0).view()).unwrap();
        assert_eq!(pipeline.state(), PipelineState::MaskReady);

        let mask = pipeline.take_mask().unwrap();
        assert_eq!(mask.dim(), (2, 2));
        assert_eq!(pipeline.state(), PipelineState::AwaitingFrame);
        assert_eq!(pipeline.frames_processed(), 1);
    }

    #[test]
    fn take_mask_requires_a_submitted_frame() {
        let mut pipeline = FramePipeline::new(MixtureConfig::default(), gray_shape(1, 1)).unwrap();
        assert!(matches!(pipeline.take_mask(), Err(AgmmError::NoMaskReady)));

        pipeline.process_frame(constant(1, 1, 122.0).view()).unwrap();
        assert!(matches!(pipeline.take_mask(), Err(AgmmError::NoMaskReady)));
    }

    #[test]
    fn unclaimed_mask_is_replaced_by_next_frame() {
        let mut pipeline = FramePipeline::new(MixtureConfig::default(), gray_shape(1, 1)).unwrap();
        pipeline.submit(constant(1, 1, 10.0).view()).unwrap();
        pipeline.submit(constant(1, 1, 122.0).view()).unwrap();
        let mask = pipeline.take_mask().unwrap();
        assert!(!mask.is_foreground(0, 0));
        assert_eq!(pipeline.frames_processed(), 2);
    }

    #[test]
    fn stats_report_replacements_and_skips() {
        let mut pipeline = FramePipeline::new(MixtureConfig::default(), gray_shape(1, 3)).unwrap();
        let frame = Array3::from_shape_vec((1, 3, 1), vec![122.0, 10.0, f32::NAN]).unwrap();
        let stats = pipeline.submit(frame.view()).unwrap();
        assert_eq!(
            stats,
            FrameStats {
                foreground: 1,
                skipped: 1,
                replaced: 1,
                degenerate: 0
            }
        );
    }

    #[test]
    fn classification_order_changes_the_decision() {
        // c1 is outside the background set before this frame's update and
        // inside it afterwards.
        let seed = |pipeline: &mut FramePipeline| {
            let pixel = pipeline.model_mut().pixel_mut(0, 0);
            pixel[0] = Component::seeded(&[0.0], 4.0, 0.52);
            pixel[1] = Component::seeded(&[100.0], 4.0, 0.48);
        };
        let config = MixtureConfig {
            components: 2,
            alpha: 0.1,
            beta: 0.5,
            ..Default::default()
        };

        let mut before = FramePipeline::new(config.clone(), gray_shape(1, 1)).unwrap();
        seed(&mut before);
        let mask = before.process_frame(constant(1, 1, 100.0).view()).unwrap();
        assert!(mask.is_foreground(0, 0));

        let after_config = MixtureConfig {
            order: ClassificationOrder::AfterUpdate,
            ..config
        };
        let mut after = FramePipeline::new(after_config, gray_shape(1, 1)).unwrap();
        seed(&mut after);
        let mask = after.process_frame(constant(1, 1, 100.0).view()).unwrap();
        assert!(!mask.is_foreground(0, 0));
    }

    #[test]
    fn stop_flag_cancels_without_a_mask() {
        let stop = Arc::new(AtomicBool::new(true));
        let mut pipeline = FramePipeline::new(MixtureConfig::default(), gray_shape(4, 4))
            .unwrap()
            .with_stop_flag(Arc::clone(&stop));

        let prior: Vec<Component> = pipeline.model().pixels().flatten().copied().collect();
        let result = pipeline.submit(constant(4, 4, 10.0).view());
        assert!(matches!(result, Err(AgmmError::Cancelled)));
        // flag already set, so no row was reached
        let after: Vec<Component> = pipeline.model().pixels().flatten().copied().collect();
        assert_eq!(after, prior);
        assert_eq!(pipeline.state(), PipelineState::AwaitingFrame);
        assert!(matches!(pipeline.take_mask(), Err(AgmmError::NoMaskReady)));
        assert_eq!(pipeline.frames_processed(), 0);

        stop.store(false, Ordering::Relaxed);
        let mask = pipeline.process_frame(constant(4, 4, 10.0).view()).unwrap();
        assert_eq!(mask.foreground_count(), 16);
    }

    #[test]
    fn reset_state_drops_learned_components() {
        let mut pipeline = FramePipeline::new(MixtureConfig::default(), gray_shape(1, 1)).unwrap();
        pipeline.process_frame(constant(1, 1, 10.0).view()).unwrap();
        assert!(pipeline.model().pixel(0, 0).iter().any(|c| c.mean[0] == 10.0));

        pipeline.reset_state();
        assert!(pipeline.model().pixel(0, 0).iter().all(|c| c.mean[0] == 122.0));
        assert_eq!(pipeline.state(), PipelineState::AwaitingFrame);
    }

    #[test]
    fn non_contiguous_frames_are_accepted() {
        let mut pipeline = FramePipeline::new(MixtureConfig::default(), gray_shape(2, 3)).unwrap();
        let transposed = Array3::from_elem((3, 2, 1), 122.0f32);
        let view = transposed.view().permuted_axes([1, 0, 2]);
        assert!(view.as_slice().is_none());
        let mask = pipeline.process_frame(view).unwrap();
        assert_eq!(mask.foreground_count(), 0);
    }
}
