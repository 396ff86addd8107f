//! Fully resolved parameters for one warp request.
//!
//! [`WarpParams`] is plain data: everything that depends on the image
//! size or the detector output has already been computed, so the same
//! value drives the local chunked path and a delegated worker.

use serde::{Deserialize, Serialize};

use crate::effect::{EffectLimits, EffectOptions};
use crate::field::{FaceGeometry, amplification, resolve_face_box};
use crate::types::{Dimensions, FaceBox, Falloff, Interpolation, SliderMap, WarpConfig, WarpError};

const fn default_inner_edge() -> f64 {
    WarpConfig::DEFAULT_INNER_EDGE
}

const fn default_max_influence() -> f64 {
    WarpConfig::DEFAULT_MAX_INFLUENCE
}

const fn default_safety_margin() -> u32 {
    WarpConfig::DEFAULT_SAFETY_MARGIN
}

const fn default_slice_rows() -> u32 {
    WarpConfig::DEFAULT_SLICE_ROWS
}

/// Everything needed to warp one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarpParams {
    /// Face center and over-scanned half-extents.
    #[serde(flatten)]
    pub geometry: FaceGeometry,
    /// Normalized distance of full displacement.
    #[serde(default = "default_inner_edge")]
    pub inner_edge: f64,
    /// Normalized distance of zero displacement.
    #[serde(default = "default_max_influence")]
    pub max_influence: f64,
    /// Slider intensities.
    #[serde(default)]
    pub sliders: SliderMap,
    /// Resolution-normalized amplification.
    pub amplification: f64,
    /// Sample coordinates stay this many pixels inside the buffer.
    #[serde(default = "default_safety_margin")]
    pub safety_margin: u32,
    /// Post-warp effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_options: Option<EffectOptions>,
    /// Box the effect is confined to. Falls back to the geometry
    /// extents when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_box: Option<FaceBox>,
    /// Per-channel noise bound.
    #[serde(default)]
    pub noise_level: u8,
    /// Noise seed.
    #[serde(default)]
    pub noise_seed: u64,
    /// Resampling kernel.
    #[serde(default)]
    pub interpolation: Interpolation,
    /// Transition curve.
    #[serde(default)]
    pub falloff: Falloff,
    /// Rows per scheduler slice.
    #[serde(default = "default_slice_rows")]
    pub slice_rows: u32,
    /// Effect cost caps.
    #[serde(flatten)]
    pub limits: EffectLimits,
}

impl WarpParams {
    /// Resolve caller input against an image of `dimensions`.
    #[must_use]
    pub fn resolve(
        face: Option<&FaceBox>,
        dimensions: Dimensions,
        sliders: &SliderMap,
        effect: &EffectOptions,
        config: &WarpConfig,
    ) -> Self {
        let face_box = resolve_face_box(face, dimensions, config);
        Self {
            geometry: FaceGeometry::resolve(Some(&face_box), dimensions, config),
            inner_edge: config.inner_edge,
            max_influence: config.max_influence,
            sliders: sliders.clone(),
            amplification: amplification(
                dimensions,
                config.amplification_base,
                config.reference_area,
            ),
            safety_margin: config.safety_margin,
            effect_options: Some(effect.clone()),
            face_box: Some(face_box),
            noise_level: config.noise_level,
            noise_seed: config.noise_seed,
            interpolation: config.interpolation,
            falloff: config.falloff,
            slice_rows: config.slice_rows,
            limits: EffectLimits::from_config(config),
        }
    }

    /// Box effects are confined to.
    #[must_use]
    pub fn effect_box(&self) -> FaceBox {
        self.face_box.filter(|f| !f.is_degenerate()).unwrap_or_else(|| {
            // The over-scan is not known here.
            let g = self.geometry;
            FaceBox::new(
                g.center_x - g.half_extent_x,
                g.center_y - g.half_extent_y,
                g.half_extent_x * 2.0,
                g.half_extent_y * 2.0,
            )
        })
    }

    /// Check values arriving from outside the process.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::InvalidConfig`] for invalid geometry, a
    /// non-finite amplification, an empty transition band or a zero
    /// slice height.
    pub fn validate(&self) -> Result<(), WarpError> {
        if !self.geometry.is_valid() {
            return Err(WarpError::InvalidConfig(format!(
                "face geometry must be finite with positive extents, got {:?}",
                self.geometry
            )));
        }
        if !self.amplification.is_finite() {
            return Err(WarpError::InvalidConfig(format!(
                "amplification must be finite, got {}",
                self.amplification
            )));
        }
        if !(self.inner_edge.is_finite() && self.max_influence.is_finite())
            || self.inner_edge < 0.0
            || self.inner_edge >= self.max_influence
        {
            return Err(WarpError::InvalidConfig(format!(
                "transition band [{}, {}] is empty or invalid",
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::effect::EffectKind;
    use crate::types::Feature;

    const DIMS: Dimensions = Dimensions {
        width: 640,
        height: 480,
    };

    fn params() -> WarpParams {
        WarpParams::resolve(
            Some(&FaceBox::new(200.0, 100.0, 240.0, 300.0)),
            DIMS,
            &SliderMap::new().with(Feature::NoseWidth, 40.0),
            &EffectOptions::new(EffectKind::Blur, 20.0),
            &WarpConfig::default(),
        )
    }

    #[test]
    fn resolve_uses_config() {
        let p = params();
        assert!((p.amplification - WarpConfig::DEFAULT_AMPLIFICATION_BASE).abs() < 1e-12);
        assert!((p.geometry.center_x - 320.0).abs() < 1e-12);
        assert!((p.geometry.half_extent_x - 120.0 * WarpConfig::DEFAULT_OVER_SCAN).abs() < 1e-9);
        assert_eq!(p.face_box, Some(FaceBox::new(200.0, 100.0, 240.0, 300.0)));
        p.validate().unwrap();
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(params()).unwrap();
        for key in [
            "centerX",
            "centerY",
            "halfExtentX",
            "halfExtentY",
            "innerEdge",
            "maxInfluence",
            "sliders",
            "amplification",
            "safetyMargin",
            "effectOptions",
            "maxBlurRadius",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!((json["sliders"]["noseWidth"].as_f64().unwrap() - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn minimal_request_fills_defaults() {
        let p: WarpParams = serde_json::from_str(
            r#"{"centerX":50,"centerY":50,"halfExtentX":35,"halfExtentY":35,
                "amplification":1.5,"sliders":{"eyeSize":"big","mouthWidth":20,"tail":3}}"#,
        )
        .unwrap();
        assert!((p.inner_edge - WarpConfig::DEFAULT_INNER_EDGE).abs() < f64::EPSILON);
        assert_eq!(p.safety_margin, WarpConfig::DEFAULT_SAFETY_MARGIN);
        assert_eq!(p.limits, EffectLimits::default());
        assert!(p.sliders.get(Feature::EyeSize).abs() < f64::EPSILON);
        assert!((p.sliders.get(Feature::MouthWidth) - 20.0).abs() < f64::EPSILON);
        assert!(p.effect_options.is_none());
        p.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_geometry() {
        let mut p = params();
        p.geometry.half_extent_x = 0.0;
        assert!(matches!(p.validate(), Err(WarpError::InvalidConfig(_))));

        let mut p = params();
        p.inner_edge = 2.0;
        assert!(p.validate().is_err());

        let mut p = params();
        p.amplification = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn effect_box_falls_back_to_geometry() {
        let mut p = params();
        p.face_box = None;
        let b = p.effect_box();
        assert!((b.x + b.width / 2.0 - p.geometry.center_x).abs() < 1e-9);
        assert!((b.width - p.geometry.half_extent_x * 2.0).abs() < 1e-9);
    }
}
