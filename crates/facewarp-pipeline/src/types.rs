//! Shared types for the facewarp engine.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Mul};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Re-export `RgbaImage` so downstream crates can hand pixel buffers to
/// the engine without depending on `image` directly.
pub use image::RgbaImage;

/// Bytes per RGBA pixel.
pub const CHANNELS: usize = 4;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing image.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Number of bytes an RGBA buffer of these dimensions occupies.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rgba_len(self) -> usize {
        self.pixel_count() as usize * CHANNELS
    }
}

/// A 2D point in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned face rectangle reported by the face detector, in
/// source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl FaceBox {
    /// Create a new face box.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A box with zero, negative, or non-finite geometry cannot anchor
    /// the displacement field.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !(self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0)
    }

    /// Box center.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Output of the external face detector.
///
/// Only `face_box` drives warping. Landmarks are drawn by the
/// diagnostic renderer and otherwise ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    /// Detected face rectangle.
    pub face_box: FaceBox,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
    /// Ordered landmark points, if the detector produced them.
    #[serde(default)]
    pub landmarks: Vec<Point>,
}

/// Facial feature controlled by one slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    /// Enlarge or shrink both eyes.
    EyeSize,
    /// Move the eyes apart or together.
    EyeSpacing,
    /// Raise or lower the eyebrows.
    EyebrowHeight,
    /// Widen or narrow the nose.
    NoseWidth,
    /// Lengthen or shorten the nose.
    NoseLength,
    /// Widen or narrow the mouth.
    MouthWidth,
    /// Open or flatten the mouth vertically.
    MouthHeight,
    /// Widen or narrow the cheeks.
    FaceWidth,
    /// Stretch or compress the chin.
    ChinShape,
    /// Push the jaw corners out or in.
    Jawline,
}

impl Feature {
    /// Every feature, in display order.
    pub const ALL: [Self; 10] = [
        Self::EyeSize,
        Self::EyeSpacing,
        Self::EyebrowHeight,
        Self::NoseWidth,
        Self::NoseLength,
        Self::MouthWidth,
        Self::MouthHeight,
        Self::FaceWidth,
        Self::ChinShape,
        Self::Jawline,
    ];

    /// Wire identifier (matches the serde representation).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EyeSize => "eyeSize",
            Self::EyeSpacing => "eyeSpacing",
            Self::EyebrowHeight => "eyebrowHeight",
            Self::NoseWidth => "noseWidth",
            Self::NoseLength => "noseLength",
            Self::MouthWidth => "mouthWidth",
            Self::MouthHeight => "mouthHeight",
            Self::FaceWidth => "faceWidth",
            Self::ChinShape => "chinShape",
            Self::Jawline => "jawline",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown feature identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown facial feature: {0}")]
pub struct UnknownFeature(pub String);

impl FromStr for Feature {
    type Err = UnknownFeature;

    /// Accepts the camelCase wire name or its snake_case spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|feature| feature.name().to_ascii_lowercase() == folded)
            .ok_or_else(|| UnknownFeature(s.to_owned()))
    }
}

/// Signed slider intensities keyed by feature.
///
/// Absent features read as zero, and so do non-finite values. Reads
/// are clamped to `±`[`SliderMap::LIMIT`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SliderMap(BTreeMap<Feature, f64>);

impl SliderMap {
    /// Largest magnitude a slider can contribute.
    pub const LIMIT: f64 = 100.0;

    /// An empty map: every slider at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, value);
        self
    }

    /// Set one slider.
    pub fn set(&mut self, feature: Feature, value: f64) {
        self.0.insert(feature, value);
    }

    /// Effective intensity of one slider.
    #[must_use]
    pub fn get(&self, feature: Feature) -> f64 {
        match self.0.get(&feature) {
            Some(v) if v.is_finite() => v.clamp(-Self::LIMIT, Self::LIMIT),
            _ => 0.0,
        }
    }

    /// Returns `true` if every slider reads as zero.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_neutral(&self) -> bool {
        Feature::ALL.into_iter().all(|f| self.get(f) == 0.0)
    }

    /// Iterate the raw stored entries.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.0.iter().map(|(f, v)| (*f, *v))
    }
}

impl FromIterator<(Feature, f64)> for SliderMap {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Lenient deserialization: unknown keys are skipped and non-numeric
/// values (`null`, strings, objects) read as zero.
impl<'de> Deserialize<'de> for SliderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Lenient {
            Number(f64),
            Other(serde::de::IgnoredAny),
        }

        let raw = BTreeMap::<String, Lenient>::deserialize(deserializer)?;
        let mut sliders = Self::new();
        for (key, value) in raw {
            let Ok(feature) = key.parse::<Feature>() else {
                continue;
            };
            let value = match value {
                Lenient::Number(v) => v,
                Lenient::Other(_) => 0.0,
            };
            sliders.set(feature, value);
        }
        Ok(sliders)
    }
}

/// A displacement vector in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Displacement {
    /// Horizontal displacement.
    pub dx: f64,
    /// Vertical displacement.
    pub dy: f64,
}

impl Displacement {
    /// No displacement.
    pub const ZERO: Self = Self { dx: 0.0, dy: 0.0 };

    /// Create a new displacement.
    #[must_use]
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// Exactly zero on both axes (negative zero included).
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_zero(self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }

    /// Euclidean length.
    #[must_use]
    pub fn magnitude(self) -> f64 {
        self.dx.hypot(self.dy)
    }
}

impl Add for Displacement {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

impl AddAssign for Displacement {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Mul<f64> for Displacement {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.dx * rhs, self.dy * rhs)
    }
}

/// Sub-pixel interpolation scheme used by the resampler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// 2x2 neighborhood, linear weights.
    Bilinear,
    /// 4x4 neighborhood, Catmull-Rom cubic weights.
    #[default]
    Bicubic,
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bilinear => f.write_str("bilinear"),
            Self::Bicubic => f.write_str("bicubic"),
        }
    }
}

/// Smoothstep order used for the transition between the inner edge and
/// the maximum influence distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Falloff {
    /// `3t^2 - 2t^3`.
    Cubic,
    /// `6t^5 - 15t^4 + 10t^3`.
    Quintic,
    /// `-20t^7 + 70t^6 - 84t^5 + 35t^4`.
    #[default]
    Septic,
}

impl fmt::Display for Falloff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cubic => f.write_str("cubic"),
            Self::Quintic => f.write_str("quintic"),
            Self::Septic => f.write_str("septic"),
        }
    }
}

/// Tunable constants for the warping engine.
///
/// Every field has a `DEFAULT_*` associated constant so front ends can
/// reuse library defaults. Call [`validate`](Self::validate) on
/// configs that come from outside the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    /// Amplification at the reference resolution.
    pub amplification_base: f64,

    /// Image area (pixels) at which amplification equals
    /// `amplification_base`.
    pub reference_area: f64,

    /// Half-extent multiplier applied to the detected face box so the
    /// field covers hair and ears.
    pub over_scan: f64,

    /// Width of the substitute face box as a fraction of image width.
    pub default_face_width: f64,

    /// Height of the substitute face box as a fraction of image height.
    pub default_face_height: f64,

    /// Normalized distance up to which displacement is applied in full.
    pub inner_edge: f64,

    /// Normalized distance at and beyond which displacement is zero.
    pub max_influence: f64,

    /// Transition curve between `inner_edge` and `max_influence`.
    pub falloff: Falloff,

    /// Resampling kernel.
    pub interpolation: Interpolation,

    /// Minimum distance (pixels) between any sample coordinate and the
    /// buffer edge.
    pub safety_margin: u32,

    /// Rows processed per scheduler slice.
    pub slice_rows: u32,

    /// Maximum per-channel noise offset added to resampled pixels.
    pub noise_level: u8,

    /// Seed for the noise generator.
    pub noise_seed: u64,

    /// How long to wait for a delegated worker before falling back.
    pub worker_timeout_ms: u64,

    /// Upper bound on the blur effect radius in pixels.
    pub max_blur_radius: u32,

    /// Upper bound on the pixelate effect block size in pixels.
    pub max_pixel_block: u32,
}

impl WarpConfig {
    /// Default amplification base.
    pub const DEFAULT_AMPLIFICATION_BASE: f64 = 3.0;
    /// Default reference area (640 x 480).
    pub const DEFAULT_REFERENCE_AREA: f64 = 640.0 * 480.0;
    /// Default face box over-scan.
    pub const DEFAULT_OVER_SCAN: f64 = 1.4;
    /// Default substitute face width fraction.
    pub const DEFAULT_FACE_WIDTH: f64 = 0.5;
    /// Default substitute face height fraction.
    pub const DEFAULT_FACE_HEIGHT: f64 = 0.6;
    /// Default inner edge.
    pub const DEFAULT_INNER_EDGE: f64 = 0.8;
    /// Default maximum influence distance.
    pub const DEFAULT_MAX_INFLUENCE: f64 = 1.25;
    /// Default safety margin.
    pub const DEFAULT_SAFETY_MARGIN: u32 = 2;
    /// Default slice height.
    pub const DEFAULT_SLICE_ROWS: u32 = 32;
    /// Default worker timeout.
    pub const DEFAULT_WORKER_TIMEOUT_MS: u64 = 5000;
    /// Default blur radius cap.
    pub const DEFAULT_MAX_BLUR_RADIUS: u32 = 24;
    /// Default pixel block cap.
    pub const DEFAULT_MAX_PIXEL_BLOCK: u32 = 48;

    /// Worker timeout as a [`Duration`].
    #[must_use]
    pub const fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    /// Check the invariants the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), WarpError> {
        let positive = [
            ("amplification_base", self.amplification_base),
            ("reference_area", self.reference_area),
            ("over_scan", self.over_scan),
            ("default_face_width", self.default_face_width),
            ("default_face_height", self.default_face_height),
            ("max_influence", self.max_influence),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(WarpError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if !self.inner_edge.is_finite() || self.inner_edge < 0.0 {
            return Err(WarpError::InvalidConfig(format!(
                "inner_edge must be finite and non-negative, got {}",
                self.inner_edge
            )));
        }
        if self.inner_edge >= self.max_influence {
            return Err(WarpError::InvalidConfig(format!(
                "inner_edge ({}) must be below max_influence ({})",
                self.inner_edge, self.max_influence
            )));
        }
        if self.slice_rows == 0 {
            return Err(WarpError::InvalidConfig(
                "slice_rows must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            amplification_base: Self::DEFAULT_AMPLIFICATION_BASE,
            reference_area: Self::DEFAULT_REFERENCE_AREA,
            over_scan: Self::DEFAULT_OVER_SCAN,
            default_face_width: Self::DEFAULT_FACE_WIDTH,
            default_face_height: Self::DEFAULT_FACE_HEIGHT,
            inner_edge: Self::DEFAULT_INNER_EDGE,
            max_influence: Self::DEFAULT_MAX_INFLUENCE,
            falloff: Falloff::default(),
            interpolation: Interpolation::default(),
            safety_margin: Self::DEFAULT_SAFETY_MARGIN,
            slice_rows: Self::DEFAULT_SLICE_ROWS,
            noise_level: 0,
            noise_seed: 0,
            worker_timeout_ms: Self::DEFAULT_WORKER_TIMEOUT_MS,
            max_blur_radius: Self::DEFAULT_MAX_BLUR_RADIUS,
            max_pixel_block: Self::DEFAULT_MAX_PIXEL_BLOCK,
        }
    }
}

/// Errors produced by the warping engine.
///
/// Most recoverable conditions (degenerate face box, mismatched buffer,
/// worker failure) never reach callers of [`crate::warp_face`]; they
/// surface only from the lower-level entry points.
#[derive(Debug, thiserror::Error)]
pub enum WarpError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode an encoded image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// A raw buffer does not match its declared dimensions.
    #[error("pixel buffer holds {actual} bytes but {width}x{height} RGBA needs {expected}")]
    BufferMismatch {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Byte count the dimensions require.
        expected: usize,
        /// Byte count actually supplied.
        actual: usize,
    },

    /// Configuration is invalid.
    #[error("invalid warp configuration: {0}")]
    InvalidConfig(String),

    /// A delegated worker reported a failure or disappeared.
    #[error("worker error: {0}")]
    Worker(String),

    /// A delegated worker did not answer in time.
    #[error("worker did not respond within {0:?}")]
    Timeout(Duration),

    /// Warping panicked; the source image was returned instead.
    #[error("warping panicked: {0}")]
    Panicked(String),
}

/// Wrap a raw RGBA byte vector in an [`RgbaImage`].
///
/// # Errors
///
/// Returns [`WarpError::BufferMismatch`] if `bytes.len()` is not
/// `width * height * 4`.
pub fn rgba_from_raw(width: u32, height: u32, bytes: Vec<u8>) -> Result<RgbaImage, WarpError> {
    let expected = Dimensions { width, height }.rgba_len();
    let actual = bytes.len();
    if actual != expected {
        return Err(WarpError::BufferMismatch {
            width,
            height,
            expected,
            actual,
        });
    }
    RgbaImage::from_raw(width, height, bytes).ok_or(WarpError::BufferMismatch {
        width,
        height,
        expected,
        actual,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_face_boxes() {
        assert!(!FaceBox::new(0.0, 0.0, 10.0, 10.0).is_degenerate());
        assert!(FaceBox::new(0.0, 0.0, 0.0, 10.0).is_degenerate());
        assert!(FaceBox::new(0.0, 0.0, 10.0, -1.0).is_degenerate());
        assert!(FaceBox::new(f64::NAN, 0.0, 10.0, 10.0).is_degenerate());
    }

    #[test]
    fn face_box_center() {
        let c = FaceBox::new(10.0, 20.0, 40.0, 60.0).center();
        assert_eq!(c, Point::new(30.0, 50.0));
    }

    #[test]
    fn feature_parses_wire_and_snake_names() {
        assert_eq!("eyeSize".parse::<Feature>().unwrap(), Feature::EyeSize);
        assert_eq!("eye_size".parse::<Feature>().unwrap(), Feature::EyeSize);
        assert_eq!("JAWLINE".parse::<Feature>().unwrap(), Feature::Jawline);
        assert!("earSize".parse::<Feature>().is_err());
    }

    #[test]
    fn feature_display_matches_serde() {
        for feature in Feature::ALL {
            let json = serde_json::to_string(&feature).unwrap();
            assert_eq!(json, format!("\"{feature}\""));
        }
    }

    #[test]
    fn missing_slider_reads_zero() {
        let sliders = SliderMap::new().with(Feature::EyeSize, 40.0);
        assert!((sliders.get(Feature::EyeSize) - 40.0).abs() < f64::EPSILON);
        assert!(sliders.get(Feature::NoseWidth).abs() < f64::EPSILON);
    }

    #[test]
    fn non_finite_slider_reads_zero() {
        let sliders = SliderMap::new()
            .with(Feature::EyeSize, f64::NAN)
            .with(Feature::NoseWidth, f64::INFINITY);
        assert!(sliders.get(Feature::EyeSize).abs() < f64::EPSILON);
        assert!(sliders.get(Feature::NoseWidth).abs() < f64::EPSILON);
        assert!(sliders.is_neutral());
    }

    #[test]
    fn slider_reads_are_clamped() {
        let sliders = SliderMap::new()
            .with(Feature::ChinShape, 500.0)
            .with(Feature::Jawline, -250.0);
        assert!((sliders.get(Feature::ChinShape) - 100.0).abs() < f64::EPSILON);
        assert!((sliders.get(Feature::Jawline) + 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn slider_json_is_lenient() {
        let json = r#"{"eyeSize": 25, "noseWidth": null, "mouthWidth": "wide", "earSize": 9}"#;
        let sliders: SliderMap = serde_json::from_str(json).unwrap();
        assert!((sliders.get(Feature::EyeSize) - 25.0).abs() < f64::EPSILON);
        assert!(sliders.get(Feature::NoseWidth).abs() < f64::EPSILON);
        assert!(sliders.get(Feature::MouthWidth).abs() < f64::EPSILON);
    }

    #[test]
    fn displacement_arithmetic() {
        let mut d = Displacement::new(1.0, -2.0);
        d += Displacement::new(0.5, 0.5);
        assert_eq!(d, Displacement::new(1.5, -1.5));
        assert_eq!(d * 2.0, Displacement::new(3.0, -3.0));
        assert!((Displacement::new(3.0, 4.0).magnitude() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn negative_zero_displacement_is_zero() {
        assert!(Displacement::new(-0.0, 0.0).is_zero());
        assert!(!Displacement::new(1e-300, 0.0).is_zero());
    }

    #[test]
    fn default_config_is_valid() {
        WarpConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_edges_are_rejected() {
        let config = WarpConfig {
            inner_edge: 1.5,
            max_influence: 1.0,
            ..WarpConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WarpError::InvalidConfig(msg)) if msg.contains("inner_edge")
        ));
    }

    #[test]
    fn zero_slice_rows_rejected() {
        let config = WarpConfig {
            slice_rows: 0,
            ..WarpConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: WarpConfig =
            serde_json::from_str(r#"{"noise_level": 4, "interpolation": "bilinear"}"#).unwrap();
        assert_eq!(config.noise_level, 4);
        assert_eq!(config.interpolation, Interpolation::Bilinear);
        assert_eq!(config.slice_rows, WarpConfig::DEFAULT_SLICE_ROWS);
    }

    #[test]
    fn rgba_from_raw_checks_length() {
        assert!(rgba_from_raw(2, 2, vec![0; 16]).is_ok());
        let err = rgba_from_raw(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            WarpError::BufferMismatch {
                expected: 16,
                actual: 15,
                ..
            }
        ));
    }

    #[test]
    fn error_display() {
        let err = WarpError::InvalidConfig("slice_rows must be at least 1".into());
        assert_eq!(
            err.to_string(),
            "invalid warp configuration: slice_rows must be at least 1"
        );
        assert_eq!(WarpError::EmptyInput.to_string(), "input image data is empty");
    }
}
