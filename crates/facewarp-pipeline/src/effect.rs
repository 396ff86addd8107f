//! Effect post-processing, applied after warping and confined to the
//! face box.
//!
//! Exactly one effect runs per request: [`EffectKind`] is a plain enum,
//! so blur, pixelation and mask overlay cannot be combined.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::overlay::MaskImage;
use crate::types::{FaceBox, Point, RgbaImage, WarpConfig};

/// Which effect to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Leave the warped image as is.
    #[default]
    None,
    /// Smooth the face area.
    Blur,
    /// Replace the face area with block-averaged color.
    Pixelate,
    /// Composite a caller-supplied image over the face.
    Mask,
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Blur => "blur",
            Self::Pixelate => "pixelate",
            Self::Mask => "mask",
        })
    }
}

/// Effect request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectOptions {
    /// Effect to apply.
    #[serde(rename = "type")]
    pub kind: EffectKind,
    /// Strength in `[0, 100]`; out-of-range values are clamped.
    pub intensity: f64,
    /// Image composited by [`EffectKind::Mask`].
    pub mask_image: Option<MaskImage>,
    /// Mask center as fractions of the face box (`0.5, 0.5` is the
    /// box center).
    pub mask_position: Point,
    /// Mask width as a multiple of the face box width.
    pub mask_scale: f64,
}

impl EffectOptions {
    /// Default intensity.
    pub const DEFAULT_INTENSITY: f64 = 50.0;
    /// Default mask scale.
    pub const DEFAULT_MASK_SCALE: f64 = 1.0;

    /// Effect options for `kind` at `intensity`.
    #[must_use]
    pub fn new(kind: EffectKind, intensity: f64) -> Self {
        Self {
            kind,
            intensity,
            ..Self::default()
        }
    }

    /// No effect.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Intensity clamped to `[0, 100]`; non-finite reads as zero.
    #[must_use]
    pub fn clamped_intensity(&self) -> f64 {
        if self.intensity.is_finite() {
            self.intensity.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

impl Default for EffectOptions {
    fn default() -> Self {
        Self {
            kind: EffectKind::None,
            intensity: Self::DEFAULT_INTENSITY,
            mask_image: None,
            mask_position: Point::new(0.5, 0.5),
            mask_scale: Self::DEFAULT_MASK_SCALE,
        }
    }
}

/// Caps on effect cost, whatever the requested intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectLimits {
    /// Largest blur radius in pixels.
    pub max_blur_radius: u32,
    /// Largest pixelation block in pixels.
    pub max_pixel_block: u32,
}

impl EffectLimits {
    /// Limits taken from a config.
    #[must_use]
    pub const fn from_config(config: &WarpConfig) -> Self {
        Self {
            max_blur_radius: config.max_blur_radius,
            max_pixel_block: config.max_pixel_block,
        }
    }
}

impl Default for EffectLimits {
    fn default() -> Self {
        Self {
            max_blur_radius: WarpConfig::DEFAULT_MAX_BLUR_RADIUS,
            max_pixel_block: WarpConfig::DEFAULT_MAX_PIXEL_BLOCK,
        }
    }
}

/// Integer pixel rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl PixelRect {
    /// Clip a face box to the pixels of an image.
    ///
    /// Returns `None` if nothing of the box lies inside the image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn clip(face: &FaceBox, image_width: u32, image_height: u32) -> Option<Self> {
        if face.is_degenerate() {
            return None;
        }
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        let x0 = face.x.floor().clamp(0.0, w);
        let y0 = face.y.floor().clamp(0.0, h);
        let x1 = (face.x + face.width).ceil().clamp(0.0, w);
        let y1 = (face.y + face.height).ceil().clamp(0.0, h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    /// One past the right column.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// One past the bottom row.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Apply the requested effect inside `face`.
///
/// Returns the effect that actually changed the image, or `None` when
/// the request was a no-op (kind `none`, zero intensity, no mask image,
/// or a face box entirely outside the image).
pub fn apply_effect(
    image: &mut RgbaImage,
    face: &FaceBox,
    options: &EffectOptions,
    limits: EffectLimits,
) -> Option<EffectKind> {
    if options.kind == EffectKind::None {
        return None;
    }
    let rect = PixelRect::clip(face, image.width(), image.height())?;
    let intensity = options.clamped_intensity();

    let applied = match options.kind {
        EffectKind::None => false,
        EffectKind::Blur => {
            let radius = crate::blur::blur_radius(intensity, limits.max_blur_radius);
            crate::blur::blur_region(image, rect, radius)
        }
        EffectKind::Pixelate => {
            let block = crate::pixelate::block_size(intensity, limits.max_pixel_block);
            crate::pixelate::pixelate_region(image, rect, block)
        }
        EffectKind::Mask => options.mask_image.as_ref().is_some_and(|mask| {
            crate::overlay::composite_mask(
                image,
                rect,
                mask,
                options.mask_position,
                options.mask_scale,
                intensity / 100.0,
            )
        }),
    };

    tracing::debug!(kind = %options.kind, intensity, ?rect, applied, "effect");
    applied.then_some(options.kind)
}
