//! Displacement field generator.
//!
//! Turns a face box into face-relative geometry, sums the
//! [`RegionModel`] contributions at each pixel, and attenuates the total
//! with a smoothstep transition so displacement reaches exactly zero at
//! the maximum influence distance.

use serde::{Deserialize, Serialize};

use crate::region::{NormPoint, RegionModel};
use crate::types::{Dimensions, Displacement, FaceBox, Falloff, SliderMap, WarpConfig};

/// Face center and over-scanned half-extents in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceGeometry {
    /// Horizontal center.
    pub center_x: f64,
    /// Vertical center.
    pub center_y: f64,
    /// Horizontal distance from center to normalized `x = 1`.
    pub half_extent_x: f64,
    /// Vertical distance from center to normalized `y = 1`.
    pub half_extent_y: f64,
}

impl FaceGeometry {
    /// Derive geometry from a detected face box.
    ///
    /// A missing or degenerate box is replaced by a centered box
    /// covering `config.default_face_width` x `config.default_face_height`
    /// of the image.
    #[must_use]
    pub fn resolve(face: Option<&FaceBox>, dimensions: Dimensions, config: &WarpConfig) -> Self {
        let face = resolve_face_box(face, dimensions, config);
        let center = face.center();
        Self {
            center_x: center.x,
            center_y: center.y,
            half_extent_x: face.width / 2.0 * config.over_scan,
            half_extent_y: face.height / 2.0 * config.over_scan,
        }
    }

    /// Re-express a pixel position relative to the face.
    #[must_use]
    pub fn normalize(&self, x: f64, y: f64) -> NormPoint {
        NormPoint::new(
            (x - self.center_x) / self.half_extent_x,
            (y - self.center_y) / self.half_extent_y,
        )
    }

    /// Half-extents must be finite and positive for normalization to
    /// mean anything.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.center_x.is_finite()
            && self.center_y.is_finite()
            && self.half_extent_x.is_finite()
            && self.half_extent_y.is_finite()
            && self.half_extent_x > 0.0
            && self.half_extent_y > 0.0
    }
}

/// The detected box, or the centered default when it is missing or
/// degenerate.
#[must_use]
pub fn resolve_face_box(
    face: Option<&FaceBox>,
    dimensions: Dimensions,
    config: &WarpConfig,
) -> FaceBox {
    face.filter(|f| !f.is_degenerate())
        .copied()
        .unwrap_or_else(|| default_face_box(dimensions, config))
}

/// Centered substitute box used when detection gives nothing usable.
#[must_use]
pub fn default_face_box(dimensions: Dimensions, config: &WarpConfig) -> FaceBox {
    let w = f64::from(dimensions.width);
    let h = f64::from(dimensions.height);
    let width = w * config.default_face_width;
    let height = h * config.default_face_height;
    FaceBox::new((w - width) / 2.0, (h - height) / 2.0, width, height)
}

/// Resolution-normalized amplification: `base * sqrt(area / reference_area)`.
#[must_use]
pub fn amplification(dimensions: Dimensions, base: f64, reference_area: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let area = dimensions.pixel_count() as f64;
    if area <= 0.0 || reference_area <= 0.0 {
        return 0.0;
    }
    base * (area / reference_area).sqrt()
}

/// Scale applied to the summed displacement at normalized distance
/// `dist`.
///
/// `1.0` up to `inner_edge`, `0.0` from `max_influence` on, and a
/// monotone smoothstep in between.
#[must_use]
pub fn transition_factor(dist: f64, inner_edge: f64, max_influence: f64, falloff: Falloff) -> f64 {
    if dist <= inner_edge {
        return 1.0;
    }
    if dist >= max_influence || !dist.is_finite() {
        return 0.0;
    }
    let t = (dist - inner_edge) / (max_influence - inner_edge);
    let eased = match falloff {
        Falloff::Cubic => t * t * 2.0f64.mul_add(-t, 3.0),
        Falloff::Quintic => t * t * t * t.mul_add(6.0f64.mul_add(t, -15.0), 10.0),
        Falloff::Septic => {
            let t2 = t * t;
            // -20t^7 + 70t^6 - 84t^5 + 35t^4
            t2 * t2 * t.mul_add(t.mul_add((-20.0f64).mul_add(t, 70.0), -84.0), 35.0)
        }
    };
    (1.0 - eased).clamp(0.0, 1.0)
}

/// The per-pixel displacement field for one request.
///
/// Borrows the region model and sliders; nothing is cached between
/// evaluations.
#[derive(Debug, Clone, Copy)]
pub struct DisplacementField<'a> {
    model: &'a RegionModel,
    sliders: &'a SliderMap,
    geometry: FaceGeometry,
    amplification: f64,
    inner_edge: f64,
    max_influence: f64,
    falloff: Falloff,
}

impl<'a> DisplacementField<'a> {
    /// Build a field with the default transition band.
    #[must_use]
    pub fn new(
        model: &'a RegionModel,
        sliders: &'a SliderMap,
        geometry: FaceGeometry,
        amplification: f64,
    ) -> Self {
        Self {
            model,
            sliders,
            geometry,
            amplification,
            inner_edge: WarpConfig::DEFAULT_INNER_EDGE,
            max_influence: WarpConfig::DEFAULT_MAX_INFLUENCE,
            falloff: Falloff::default(),
        }
    }

    /// Override the transition band.
    #[must_use]
    pub const fn with_transition(
        mut self,
        inner_edge: f64,
        max_influence: f64,
        falloff: Falloff,
    ) -> Self {
        self.inner_edge = inner_edge;
        self.max_influence = max_influence;
        self.falloff = falloff;
        self
    }

    /// Face geometry the field is anchored to.
    #[must_use]
    pub const fn geometry(&self) -> FaceGeometry {
        self.geometry
    }

    /// Amplification factor in use.
    #[must_use]
    pub const fn amplification(&self) -> f64 {
        self.amplification
    }

    /// Whether every pixel on row `y` is beyond the influence distance.
    #[must_use]
    pub fn row_is_outside(&self, y: f64) -> bool {
        ((y - self.geometry.center_y) / self.geometry.half_extent_y).abs() >= self.max_influence
    }

    /// Column range `[start, end)` that can carry non-zero displacement,
    /// clipped to `width`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn column_span(&self, width: u32) -> (u32, u32) {
        let reach = self.geometry.half_extent_x * self.max_influence;
        let start = (self.geometry.center_x - reach).floor().max(0.0);
        let end = (self.geometry.center_x + reach).ceil() + 1.0;
        let end = end.clamp(0.0, f64::from(width));
        let start = start.min(end);
        (start as u32, end as u32)
    }

    /// Total displacement at pixel `(x, y)`.
    #[must_use]
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn at(&self, x: f64, y: f64) -> Displacement {
        let point = self.geometry.normalize(x, y);
        if !(point.dist < self.max_influence) {
            return Displacement::ZERO;
        }
        let factor =
            transition_factor(point.dist, self.inner_edge, self.max_influence, self.falloff);
        self.model.displacement(point, self.sliders, self.amplification) * factor
    }

    /// Sample the field every `step` pixels, starting at `step / 2`.
    ///
    /// Used by the diagnostic renderer.
    #[must_use]
    pub fn sample_grid(&self, dimensions: Dimensions, step: u32) -> Vec<(u32, u32, Displacement)> {
        let step = step.max(1);
        let offset = step / 2;
        let mut samples = Vec::new();
        for y in (offset..dimensions.height).step_by(step as usize) {
            for x in (offset..dimensions.width).step_by(step as usize) {
                samples.push((x, y, self.at(f64::from(x), f64::from(y))));
            }
        }
        samples
    }
}
