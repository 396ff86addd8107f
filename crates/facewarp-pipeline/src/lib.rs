//! facewarp-pipeline: Pure facial feature warping engine (sans-IO).
//!
//! Deforms a face in an RGBA image through:
//! region model -> displacement field -> resampling (in row slices) ->
//! optional blur, pixelate or mask effect inside the face box.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! buffers and returns structured data. All browser and filesystem
//! interaction lives in `facewarp-io`, `facewarp-worker` and
//! `facewarp-bench`.

pub mod blur;
pub mod decode;
pub mod delegate;
pub mod diagnostics;
pub mod effect;
pub mod field;
pub mod overlay;
pub mod params;
pub mod pixelate;
pub mod protocol;
pub mod region;
pub mod resample;
pub mod schedule;
pub mod session;
pub mod types;
pub mod vector_field;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

pub use delegate::{Delegate, ThreadWorker, process_with_fallback};
pub use diagnostics::{Clock, WarpDiagnostics, WebClock};
pub use effect::{EffectKind, EffectLimits, EffectOptions};
pub use field::{DisplacementField, FaceGeometry};
pub use overlay::MaskImage;
pub use params::WarpParams;
pub use protocol::{WorkerRequest, WorkerResponse};
pub use region::{FacialRegion, NormPoint, RegionModel};
pub use schedule::{Finished, SliceProgress, WarpJob, Warped, Warping};
pub use session::{Generation, WarpSession};
pub use types::{
    Dimensions, Displacement, FaceBox, FaceDetection, Falloff, Feature, Interpolation, Point,
    RgbaImage, SliderMap, WarpConfig, WarpError,
};

/// Warp the face in `image` and apply the requested effect.
///
/// This is the top-level entry point. It never fails: invalid
/// configuration, an empty image or a panic anywhere in the engine
/// yields an unmodified copy of `image`. Use [`try_warp_face`] to see
/// the error.
#[must_use]
pub fn warp_face(
    image: &RgbaImage,
    face: Option<&FaceBox>,
    sliders: &SliderMap,
    effect: &EffectOptions,
    config: &WarpConfig,
) -> RgbaImage {
    warp_face_with_model(image, face, sliders, effect, config, &RegionModel::standard())
}

/// [`warp_face`] with a caller-supplied region model.
#[must_use]
#[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn warp_face_with_model(
    image: &RgbaImage,
    face: Option<&FaceBox>,
    sliders: &SliderMap,
    effect: &EffectOptions,
    config: &WarpConfig,
    model: &RegionModel,
) -> RgbaImage {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        config.validate()?;
        let params = WarpParams::resolve(face, Dimensions::of(image), sliders, effect, config);
        process_local(image, &params, model)
    }))
    .map_err(|payload| WarpError::Panicked(panic_message(payload.as_ref())));

    match outcome {
        Ok(Ok(finished)) => finished.into_image(),
        Ok(Err(e)) | Err(e) => {
            tracing::warn!(error = %e, "warp failed, returning source image");
            image.clone()
        }
    }
}

/// Warp the face in `image`, reporting errors and diagnostics.
///
/// # Errors
///
/// Returns [`WarpError::InvalidConfig`] if `config` fails
/// [`WarpConfig::validate`].
pub fn try_warp_face(
    image: &RgbaImage,
    face: Option<&FaceBox>,
    sliders: &SliderMap,
    effect: &EffectOptions,
    config: &WarpConfig,
) -> Result<Finished, WarpError> {
    config.validate()?;
    let params = WarpParams::resolve(face, Dimensions::of(image), sliders, effect, config);
    process_local(image, &params, &RegionModel::standard())
}

/// Run every slice of a job on the calling thread.
///
/// # Errors
///
/// Returns [`WarpError::InvalidConfig`] if `params` fail
/// [`WarpParams::validate`].
pub fn process_local(
    source: &RgbaImage,
    params: &WarpParams,
    model: &RegionModel,
) -> Result<Finished, WarpError> {
    Ok(WarpJob::new(source, params, model)
        .prepare()?
        .finish()
        .apply_effect())
}

/// Warp a raw RGBA buffer.
///
/// A buffer that is empty or does not match `width x height` is
/// returned unchanged.
///
/// # Errors
///
/// Returns [`WarpError::InvalidConfig`] if `params` fail
/// [`WarpParams::validate`].
pub fn process_buffer(
    width: u32,
    height: u32,
    buffer: Vec<u8>,
    params: &WarpParams,
) -> Result<Vec<u8>, WarpError> {
    process_buffer_with_model(width, height, buffer, params, &RegionModel::standard())
}

/// [`process_buffer`] with a caller-supplied region model.
///
/// # Errors
///
/// Returns [`WarpError::InvalidConfig`] if `params` fail
/// [`WarpParams::validate`].
pub fn process_buffer_with_model(
    width: u32,
    height: u32,
    buffer: Vec<u8>,
    params: &WarpParams,
    model: &RegionModel,
) -> Result<Vec<u8>, WarpError> {
    params.validate()?;
    let dimensions = Dimensions { width, height };
    if dimensions.is_empty() || buffer.len() != dimensions.rgba_len() {
        tracing::debug!(width, height, len = buffer.len(), "returning malformed buffer unchanged");
        return Ok(buffer);
    }
    let source = types::rgba_from_raw(width, height, buffer)?;
    Ok(process_local(&source, params, model)?.into_image().into_raw())
}

/// Best-effort text of a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
