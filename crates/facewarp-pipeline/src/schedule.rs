//! Chunked warp job: advance one row slice at a time.
//!
//! ```rust
//! # use facewarp_pipeline::{RegionModel, WarpError, WarpParams, WarpJob, RgbaImage};
//! # fn run(source: &RgbaImage, params: &WarpParams) -> Result<(), WarpError> {
//! let model = RegionModel::standard();
//! let mut warping = WarpJob::new(source, params, &model).prepare()?;
//! while let Some(progress) = warping.step() {
//!     // Yield to the host between slices.
//!     let _ = progress.fraction();
//! }
//! let finished = warping.finish().apply_effect();
//! let image = finished.into_image();
//! # Ok(())
//! # }
//! ```
//!
//! Each slice writes only its own rows of the destination buffer and
//! reads only the immutable source, so a caller may stop between any
//! two slices (cooperative cancellation) without leaving shared state
//! half-written. Stage methods consume `self`, so a job cannot be
//! finished twice or have its effect applied before warping is done.

use std::ops::Range;

use crate::diagnostics::{Clock, WarpDiagnostics, WebClock};
use crate::effect::apply_effect;
use crate::field::DisplacementField;
use crate::params::WarpParams;
use crate::region::RegionModel;
use crate::resample::{Noise, Resampler, warp_rows};
use crate::types::{CHANNELS, Dimensions, RgbaImage, WarpError};

// ───────────────────────── Stage 0: WarpJob ──────────────────────────

/// A warp request that has not started.
#[must_use = "call .prepare() to start the job"]
pub struct WarpJob<'a, C: Clock = WebClock> {
    source: &'a RgbaImage,
    params: &'a WarpParams,
    model: &'a RegionModel,
    clock: C,
}

impl<'a> WarpJob<'a> {
    /// New job timed with [`WebClock`].
    pub const fn new(
        source: &'a RgbaImage,
        params: &'a WarpParams,
        model: &'a RegionModel,
    ) -> Self {
        Self {
            source,
            params,
            model,
            clock: WebClock,
        }
    }
}

impl<'a, C: Clock> WarpJob<'a, C> {
    /// Swap the clock used for diagnostics.
    pub fn with_clock<D: Clock>(self, clock: D) -> WarpJob<'a, D> {
        WarpJob {
            source: self.source,
            params: self.params,
            model: self.model,
            clock,
        }
    }

    /// Validate parameters, build the displacement field and allocate
    /// the destination buffer.
    ///
    /// An empty image or all-zero sliders yields a job with no slices,
    /// whose output is an exact copy of the source.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::InvalidConfig`] if the parameters fail
    /// [`WarpParams::validate`].
    pub fn prepare(self) -> Result<Warping<'a, C>, WarpError> {
        let started = self.clock.now();
        self.params.validate()?;

        let params = self.params;
        let dimensions = Dimensions::of(self.source);
        let field = DisplacementField::new(
            self.model,
            &params.sliders,
            params.geometry,
            params.amplification,
        )
        .with_transition(params.inner_edge, params.max_influence, params.falloff);
        let resampler = Resampler::new(self.source, params.interpolation, params.safety_margin);
        let noise = Noise {
            level: params.noise_level,
            seed: params.noise_seed,
        };

        let total_rows = if dimensions.is_empty() || params.sliders.is_neutral() {
            0
        } else {
            dimensions.height
        };

        let diagnostics = WarpDiagnostics {
            dimensions,
            prepare: self.clock.since(started),
            amplification: params.amplification,
            ..WarpDiagnostics::default()
        };

        Ok(Warping {
            params,
            field,
            resampler,
            noise,
            output: self.source.clone(),
            next_row: 0,
            total_rows,
            diagnostics,
            clock: self.clock,
            started,
        })
    }
}

// ───────────────────────── Stage 1: Warping ──────────────────────────

/// Report for one processed slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceProgress {
    /// Zero-based slice index.
    pub index: u32,
    /// Rows covered by the slice.
    pub rows: Range<u32>,
    /// Pixels resampled in the slice.
    pub displaced: u64,
    /// Every row of the slice was outside the influence area.
    pub skipped: bool,
    /// Rows done so far, including this slice.
    pub completed_rows: u32,
    /// Rows the job will process in total.
    pub total_rows: u32,
}

impl SliceProgress {
    /// Completion in `[0, 1]`.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total_rows == 0 {
            1.0
        } else {
            f64::from(self.completed_rows) / f64::from(self.total_rows)
        }
    }
}

/// A job in progress. Call [`step`](Self::step) until it returns
/// `None`, or [`finish`](Self::finish) to run the remaining slices.
#[must_use = "call .step() or .finish() to make progress"]
pub struct Warping<'a, C: Clock = WebClock> {
    params: &'a WarpParams,
    field: DisplacementField<'a>,
    resampler: Resampler<'a>,
    noise: Noise,
    output: RgbaImage,
    next_row: u32,
    total_rows: u32,
    diagnostics: WarpDiagnostics,
    clock: C,
    started: C::Instant,
}

impl<'a, C: Clock> Warping<'a, C> {
    /// Whether every slice has been processed.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.next_row >= self.total_rows
    }

    /// Number of slices the job is split into.
    #[must_use]
    pub const fn slice_count(&self) -> u32 {
        self.total_rows.div_ceil(self.params.slice_rows)
    }

    /// The displacement field being applied.
    #[must_use]
    pub const fn field(&self) -> &DisplacementField<'a> {
        &self.field
    }

    /// Process the next slice. Returns `None` once all rows are done.
    #[allow(clippy::cast_possible_truncation)]
    pub fn step(&mut self) -> Option<SliceProgress> {
        if self.is_done() {
            return None;
        }
        let step_started = self.clock.now();
        let start = self.next_row;
        let end = start.saturating_add(self.params.slice_rows).min(self.total_rows);
        let index = self.diagnostics.slices;

        let skipped = (start..end).all(|y| self.field.row_is_outside(f64::from(y)));
        let displaced = if skipped {
            0
        } else {
            let stride = self.output.width() as usize * CHANNELS;
            let raw: &mut [u8] = &mut self.output;
            let dest = &mut raw[start as usize * stride..end as usize * stride];
            warp_rows(&self.field, &self.resampler, self.noise, start..end, dest)
        };

        self.next_row = end;
        self.diagnostics.slices += 1;
        self.diagnostics.skipped_slices += u32::from(skipped);
        self.diagnostics.displaced_pixels += displaced;
        self.diagnostics.warp += self.clock.since(step_started);

        tracing::debug!(slice = index, rows = ?(start..end), displaced, skipped, "warped slice");

        Some(SliceProgress {
            index,
            rows: start..end,
            displaced,
            skipped,
            completed_rows: end,
            total_rows: self.total_rows,
        })
    }

    /// Run all remaining slices.
    pub fn finish(mut self) -> Warped<'a, C> {
        while self.step().is_some() {}
        Warped {
            params: self.params,
            output: self.output,
            diagnostics: self.diagnostics,
            clock: self.clock,
            started: self.started,
        }
    }
}

// ───────────────────────── Stage 2: Warped ───────────────────────────

/// Warping is complete; the effect has not been applied.
#[must_use = "call .apply_effect() to finish the job"]
pub struct Warped<'a, C: Clock = WebClock> {
    params: &'a WarpParams,
    output: RgbaImage,
    diagnostics: WarpDiagnostics,
    clock: C,
    started: C::Instant,
}

impl<C: Clock> Warped<'_, C> {
    /// The warped image before post-processing.
    #[must_use]
    pub const fn warped(&self) -> &RgbaImage {
        &self.output
    }

    /// Apply the requested effect inside the face box.
    pub fn apply_effect(mut self) -> Finished {
        let effect_started = self.clock.now();
        if let Some(options) = &self.params.effect_options {
            self.diagnostics.effect_kind = apply_effect(
                &mut self.output,
                &self.params.effect_box(),
                options,
                self.params.limits,
            );
        }
        self.diagnostics.effect = self.clock.since(effect_started);
        self.diagnostics.total = self.clock.since(self.started);
        Finished {
            output: self.output,
            diagnostics: self.diagnostics,
        }
    }
}

// ───────────────────────── Stage 3: Finished ─────────────────────────

/// Final output of a job.
#[derive(Debug, Clone)]
pub struct Finished {
    output: RgbaImage,
    diagnostics: WarpDiagnostics,
}

impl Finished {
    /// The output image.
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        &self.output
    }

    /// Timing and counts for the job.
    #[must_use]
    pub const fn diagnostics(&self) -> &WarpDiagnostics {
        &self.diagnostics
    }

    /// Consume the job and return the output image.
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.output
    }

    /// Consume the job and return image and diagnostics.
    #[must_use]
    pub fn into_parts(self) -> (RgbaImage, WarpDiagnostics) {
        (self.output, self.diagnostics)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use super::*;
    use crate::effect::{EffectKind, EffectOptions};
    use crate::types::{FaceBox, Feature, SliderMap, WarpConfig};

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x * 2 % 256) as u8, (y * 2 % 256) as u8, 128, 255])
        })
    }

    fn params_for(image: &RgbaImage, sliders: &SliderMap, effect: &EffectOptions) -> WarpParams {
        WarpParams::resolve(
            Some(&FaceBox::new(0.0, 0.0, f64::from(image.width()), f64::from(image.height()))),
            Dimensions::of(image),
            sliders,
            effect,
            &WarpConfig::default(),
        )
    }

    /// Clock advancing one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn since(&self, start: u64) -> Duration {
            Duration::from_millis(self.now() - start)
        }
    }

    #[test]
    fn neutral_sliders_have_no_slices() {
        let img = gradient(40, 40);
        let params = params_for(&img, &SliderMap::new(), &EffectOptions::none());
        let model = RegionModel::standard();
        let mut warping = WarpJob::new(&img, &params, &model).prepare().unwrap();
        assert!(warping.is_done());
        assert!(warping.step().is_none());
        let finished = warping.finish().apply_effect();
        assert_eq!(finished.image(), &img);
        assert_eq!(finished.diagnostics().slices, 0);
    }

    #[test]
    fn steps_cover_every_row_once() {
        let img = gradient(64, 100);
        let sliders = SliderMap::new().with(Feature::FaceWidth, 80.0);
        let mut params = params_for(&img, &sliders, &EffectOptions::none());
        params.slice_rows = 32;
        let model = RegionModel::standard();
        let mut warping = WarpJob::new(&img, &params, &model).prepare().unwrap();
        assert_eq!(warping.slice_count(), 4);

        let mut seen = Vec::new();
        while let Some(progress) = warping.step() {
            seen.push(progress.rows.clone());
            assert!(progress.fraction() <= 1.0);
        }
        assert_eq!(seen, vec![0..32, 32..64, 64..96, 96..100]);
    }

    #[test]
    fn slice_height_does_not_change_output() {
        let img = gradient(80, 80);
        let sliders = SliderMap::new()
            .with(Feature::EyeSize, 60.0)
            .with(Feature::MouthWidth, -40.0);
        let model = RegionModel::standard();
        let mut outputs = Vec::new();
        for slice_rows in [1, 7, 32, 1000] {
            let mut params = params_for(&img, &sliders, &EffectOptions::none());
            params.slice_rows = slice_rows;
            params.noise_level = 5;
            params.noise_seed = 99;
            let finished = WarpJob::new(&img, &params, &model)
                .prepare()
                .unwrap()
                .finish()
                .apply_effect();
            outputs.push(finished.into_image());
        }
        for output in &outputs[1..] {
            assert_eq!(output, &outputs[0]);
        }
        assert_ne!(outputs[0], img);
    }

    #[test]
    fn source_is_never_mutated() {
        let img = gradient(50, 50);
        let before = img.clone();
        let sliders = SliderMap::new().with(Feature::NoseWidth, 100.0);
        let params = params_for(&img, &sliders, &EffectOptions::new(EffectKind::Blur, 100.0));
        let model = RegionModel::standard();
        let out = WarpJob::new(&img, &params, &model)
            .prepare()
            .unwrap()
            .finish()
            .apply_effect()
            .into_image();
        assert_eq!(img, before);
        assert_ne!(out, img);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let img = gradient(10, 10);
        let mut params = params_for(&img, &SliderMap::new(), &EffectOptions::none());
        params.max_influence = params.inner_edge;
        let model = RegionModel::standard();
        assert!(matches!(
            WarpJob::new(&img, &params, &model).prepare(),
            Err(WarpError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_image_is_identity() {
        let img = RgbaImage::new(0, 0);
        let sliders = SliderMap::new().with(Feature::EyeSize, 50.0);
        let mut params = params_for(&gradient(10, 10), &sliders, &EffectOptions::none());
        params.amplification = 0.0;
        let model = RegionModel::standard();
        let finished = WarpJob::new(&img, &params, &model)
            .prepare()
            .unwrap()
            .finish()
            .apply_effect();
        assert_eq!(finished.image().dimensions(), (0, 0));
    }

    #[test]
    fn diagnostics_use_supplied_clock() {
        let img = gradient(40, 40);
        let sliders = SliderMap::new().with(Feature::ChinShape, 50.0);
        let mut params = params_for(&img, &sliders, &EffectOptions::none());
        params.slice_rows = 20;
        let model = RegionModel::standard();
        let finished = WarpJob::new(&img, &params, &model)
            .with_clock(TickClock(Cell::new(0)))
            .prepare()
            .unwrap()
            .finish()
            .apply_effect();
        let diag = finished.diagnostics();
        assert_eq!(diag.slices, 2);
        assert_eq!(diag.warp, Duration::from_millis(2));
        assert!(diag.total > diag.warp);
        assert!(diag.displaced_pixels > 0);
    }
}
