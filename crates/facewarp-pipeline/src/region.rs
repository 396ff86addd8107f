//! Region model: the table of facial regions that make up the
//! displacement field.
//!
//! Each [`FacialRegion`] pairs a predicate over face-relative
//! ([`NormPoint`]) coordinates with a transform that turns slider
//! intensities into a pixel displacement. Regions may overlap; a pixel
//! matched by several regions receives the sum of their displacements.
//!
//! Normalized coordinates put the face center at the origin with `y`
//! growing downward, so the eyes sit near `y = -0.25` and the chin near
//! `y = 0.8`. The boundary and gain constants below are tuning values.
//!
//! Transforms return displacement in pixels:
//! `slider * amplification * gain * shape_term`. The resampler reads
//! each destination pixel from `position - displacement`, so a positive
//! displacement pointing away from a feature's center enlarges it.

use crate::types::{Displacement, Feature, SliderMap};

/// A pixel position re-expressed relative to the face center and
/// half-extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormPoint {
    /// Horizontal offset in half-extents (negative = image left).
    pub x: f64,
    /// Vertical offset in half-extents (negative = up).
    pub y: f64,
    /// Euclidean distance from the face center.
    pub dist: f64,
}

impl NormPoint {
    /// Create a normalized point, computing its distance.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            dist: x.hypot(y),
        }
    }
}

/// Predicate deciding whether a region affects a point.
pub type Condition = fn(NormPoint) -> bool;

/// Displacement produced by a region at a point, given the sliders and
/// the amplification factor.
pub type Transform = fn(NormPoint, &SliderMap, f64) -> Displacement;

/// One named entry in the region model.
#[derive(Clone)]
pub struct FacialRegion {
    /// Human-readable region name.
    pub name: &'static str,
    /// Sliders this region reads.
    pub features: &'static [Feature],
    /// Membership predicate.
    pub condition: Condition,
    /// Displacement function.
    pub transform: Transform,
}

impl FacialRegion {
    /// Whether `point` lies inside this region.
    #[must_use]
    pub fn contains(&self, point: NormPoint) -> bool {
        (self.condition)(point)
    }

    /// This region's displacement at `point`, ignoring membership.
    #[must_use]
    pub fn displacement(
        &self,
        point: NormPoint,
        sliders: &SliderMap,
        amplification: f64,
    ) -> Displacement {
        (self.transform)(point, sliders, amplification)
    }

    /// Whether any slider this region reads is non-zero.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_active(&self, sliders: &SliderMap) -> bool {
        self.features.iter().any(|f| sliders.get(*f) != 0.0)
    }
}

impl std::fmt::Debug for FacialRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacialRegion")
            .field("name", &self.name)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

/// Ordered table of facial regions.
///
/// Built once and borrowed by every [`DisplacementField`](crate::field::DisplacementField).
#[derive(Debug, Clone)]
pub struct RegionModel {
    regions: Vec<FacialRegion>,
}

impl RegionModel {
    /// Build a model from an explicit region list.
    #[must_use]
    pub const fn new(regions: Vec<FacialRegion>) -> Self {
        Self { regions }
    }

    /// The standard seven-region face model.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![EYES, EYEBROWS, NOSE, MOUTH, FACE_WIDTH, CHIN, JAWLINE])
    }

    /// All regions, in evaluation order.
    #[must_use]
    pub fn regions(&self) -> &[FacialRegion] {
        &self.regions
    }

    /// Regions whose condition holds at `point`.
    pub fn matching(&self, point: NormPoint) -> impl Iterator<Item = &FacialRegion> {
        self.regions.iter().filter(move |r| r.contains(point))
    }

    /// Sum of the displacements of every region matching `point`.
    ///
    /// Every region is evaluated; there is no early exit on the first
    /// match.
    #[must_use]
    pub fn displacement(
        &self,
        point: NormPoint,
        sliders: &SliderMap,
        amplification: f64,
    ) -> Displacement {
        self.matching(point)
            .map(|r| r.displacement(point, sliders, amplification))
            .fold(Displacement::ZERO, |acc, d| acc + d)
    }
}

impl Default for RegionModel {
    fn default() -> Self {
        Self::standard()
    }
}

/// `signum` that maps zero to zero.
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

// ─────────────────────────────── Eyes ────────────────────────────────

const EYE_LINE: f64 = -0.25;
const EYE_HALF_HEIGHT: f64 = 0.15;
const EYE_HALF_SPAN: f64 = 0.5;
/// Horizontal offset of each eye center from the midline.
const EYE_OFFSET: f64 = 0.25;
const EYE_SIZE_GAIN: f64 = 0.2;
const EYE_SPACING_GAIN: f64 = 0.05;

/// Eyes: scale about each eye center, plus a lateral spacing shift.
pub const EYES: FacialRegion = FacialRegion {
    name: "eyes",
    features: &[Feature::EyeSize, Feature::EyeSpacing],
    condition: |p| (p.y - EYE_LINE).abs() < EYE_HALF_HEIGHT && p.x.abs() < EYE_HALF_SPAN,
    transform: |p, s, amp| {
        let side = sign(p.x);
        let size = s.get(Feature::EyeSize) * amp * EYE_SIZE_GAIN;
        let spacing = s.get(Feature::EyeSpacing) * amp * EYE_SPACING_GAIN;
        let local_x = p.x - side * EYE_OFFSET;
        let local_y = p.y - EYE_LINE;
        Displacement::new(local_x * size + side * spacing, local_y * size)
    },
};

// ───────────────────────────── Eyebrows ──────────────────────────────

const BROW_LINE: f64 = -0.45;
const BROW_HALF_HEIGHT: f64 = 0.08;
const BROW_HALF_SPAN: f64 = 0.55;
const BROW_GAIN: f64 = 0.04;

/// Eyebrows: vertical shift. Positive raises the brows.
pub const EYEBROWS: FacialRegion = FacialRegion {
    name: "eyebrows",
    features: &[Feature::EyebrowHeight],
    condition: |p| (p.y - BROW_LINE).abs() < BROW_HALF_HEIGHT && p.x.abs() < BROW_HALF_SPAN,
    transform: |_, s, amp| Displacement::new(0.0, -s.get(Feature::EyebrowHeight) * amp * BROW_GAIN),
};

// ─────────────────────────────── Nose ────────────────────────────────

const NOSE_HALF_WIDTH: f64 = 0.15;
const NOSE_TOP: f64 = -0.15;
const NOSE_BOTTOM: f64 = 0.25;
const NOSE_WIDTH_GAIN: f64 = 0.25;
const NOSE_LENGTH_GAIN: f64 = 0.03;

/// Nose: horizontal scale about the midline and a vertical stretch
/// away from the face center.
pub const NOSE: FacialRegion = FacialRegion {
    name: "nose",
    features: &[Feature::NoseWidth, Feature::NoseLength],
    condition: |p| p.x.abs() < NOSE_HALF_WIDTH && p.y > NOSE_TOP && p.y < NOSE_BOTTOM,
    transform: |p, s, amp| {
        Displacement::new(
            p.x * s.get(Feature::NoseWidth) * amp * NOSE_WIDTH_GAIN,
            sign(p.y) * s.get(Feature::NoseLength) * amp * NOSE_LENGTH_GAIN,
        )
    },
};

// ─────────────────────────────── Mouth ───────────────────────────────

const MOUTH_LINE: f64 = 0.45;
const MOUTH_HALF_HEIGHT: f64 = 0.12;
const MOUTH_HALF_SPAN: f64 = 0.4;
const MOUTH_WIDTH_GAIN: f64 = 0.15;
const MOUTH_HEIGHT_GAIN: f64 = 0.3;

/// Mouth: horizontal scale about the midline, vertical scale about the
/// mouth line.
pub const MOUTH: FacialRegion = FacialRegion {
    name: "mouth",
    features: &[Feature::MouthWidth, Feature::MouthHeight],
    condition: |p| (p.y - MOUTH_LINE).abs() < MOUTH_HALF_HEIGHT && p.x.abs() < MOUTH_HALF_SPAN,
    transform: |p, s, amp| {
        Displacement::new(
            p.x * s.get(Feature::MouthWidth) * amp * MOUTH_WIDTH_GAIN,
            (p.y - MOUTH_LINE) * s.get(Feature::MouthHeight) * amp * MOUTH_HEIGHT_GAIN,
        )
    },
};

// ──────────────────────────── Face width ─────────────────────────────

const CHEEK_INNER: f64 = 0.55;
const CHEEK_OUTER: f64 = 1.0;
const FACE_WIDTH_GAIN: f64 = 0.1;

/// Face width: horizontal scale of the ring between the features and
/// the face outline.
pub const FACE_WIDTH: FacialRegion = FacialRegion {
    name: "face_width",
    features: &[Feature::FaceWidth],
    condition: |p| p.dist > CHEEK_INNER && p.dist < CHEEK_OUTER,
    transform: |p, s, amp| {
        Displacement::new(p.x * s.get(Feature::FaceWidth) * amp * FACE_WIDTH_GAIN, 0.0)
    },
};

// ─────────────────────────────── Chin ────────────────────────────────

const CHIN_TOP: f64 = 0.65;
const CHIN_BOTTOM: f64 = 1.0;
const CHIN_HALF_WIDTH: f64 = 0.3;
const CHIN_GAIN: f64 = 0.2;

/// Chin: vertical stretch below the chin line.
pub const CHIN: FacialRegion = FacialRegion {
    name: "chin",
    features: &[Feature::ChinShape],
    condition: |p| p.y > CHIN_TOP && p.y < CHIN_BOTTOM && p.x.abs() < CHIN_HALF_WIDTH,
    transform: |p, s, amp| {
        Displacement::new(0.0, (p.y - CHIN_TOP) * s.get(Feature::ChinShape) * amp * CHIN_GAIN)
    },
};

// ────────────────────────────── Jawline ──────────────────────────────

const JAW_TOP: f64 = 0.4;
const JAW_BOTTOM: f64 = 0.9;
const JAW_INNER: f64 = 0.3;
const JAW_OUTER: f64 = 0.8;
/// Jaw corners stay inside the face outline.
const JAW_REACH: f64 = 0.95;
const JAW_GAIN: f64 = 0.05;

/// Jawline: lateral push of both jaw corners.
pub const JAWLINE: FacialRegion = FacialRegion {
    name: "jawline",
    features: &[Feature::Jawline],
    condition: |p| {
        p.y > JAW_TOP
            && p.y < JAW_BOTTOM
            && p.x.abs() >= JAW_INNER
            && p.x.abs() < JAW_OUTER
            && p.dist < JAW_REACH
    },
    transform: |p, s, amp| Displacement::new(sign(p.x) * s.get(Feature::Jawline) * amp * JAW_GAIN, 0.0),
};
