//! Warp diagnostics: timing and counts for each phase of a request.
//!
//! Timestamps come from a [`Clock`]. [`WebClock`] uses the `web-time`
//! crate, which maps to `performance.now()` on WASM and
//! `std::time::Instant` on native, so the same code measures both the
//! worker and the CLI.
//!
//! Durations are serialized as fractional seconds (`f64`) since
//! `std::time::Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::effect::EffectKind;
use crate::types::Dimensions;

/// Monotonic time source.
pub trait Clock {
    /// Opaque point in time.
    type Instant: Copy;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `start`.
    fn since(&self, start: Self::Instant) -> Duration;
}

/// [`Clock`] backed by `web_time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> Self::Instant {
        web_time::Instant::now()
    }

    fn since(&self, start: Self::Instant) -> Duration {
        start.elapsed()
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from one warp request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarpDiagnostics {
    /// Image size.
    pub dimensions: Dimensions,
    /// Geometry, amplification and region setup.
    #[serde(with = "duration_serde")]
    pub prepare: Duration,
    /// Displacement and resampling across all slices.
    #[serde(with = "duration_serde")]
    pub warp: Duration,
    /// Effect post-processing.
    #[serde(with = "duration_serde")]
    pub effect: Duration,
    /// Wall-clock total.
    #[serde(with = "duration_serde")]
    pub total: Duration,
    /// Row slices processed.
    pub slices: u32,
    /// Slices skipped because every row was outside the influence area.
    pub skipped_slices: u32,
    /// Pixels whose displacement was non-zero.
    pub displaced_pixels: u64,
    /// Amplification factor used.
    pub amplification: f64,
    /// Effect applied, if any.
    pub effect_kind: Option<EffectKind>,
}

impl WarpDiagnostics {
    /// Fraction of the image that was resampled, in percent.
    #[must_use]
    pub fn displaced_percent(&self) -> f64 {
        let total = self.dimensions.pixel_count();
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = self.displaced_pixels as f64 / total as f64 * 100.0;
        pct
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Warp Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.dimensions.width,
            self.dimensions.height,
            self.dimensions.pixel_count(),
        ));
        lines.push(format!("Total duration: {:.3}ms", duration_ms(self.total)));
        lines.push(String::new());

        lines.push(format!(
            "{:<12} {:>10} {:>10}  {}",
            "Phase", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total);
        let effect_details = self
            .effect_kind
            .map_or_else(|| "none".to_string(), |k| k.to_string());
        let phases = [
            ("Prepare", self.prepare, format!("amp={:.3}", self.amplification)),
            (
                "Warp",
                self.warp,
                format!(
                    "{} slices ({} skipped), {} px displaced ({:.1}%)",
                    self.slices,
                    self.skipped_slices,
                    self.displaced_pixels,
                    self.displaced_percent(),
                ),
            ),
            ("Effect", self.effect, effect_details),
        ];

        for (name, duration, details) in phases {
            let ms = duration_ms(duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!("{name:<12} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
#[must_use]
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> WarpDiagnostics {
        WarpDiagnostics {
            dimensions: Dimensions {
                width: 100,
                height: 50,
            },
            prepare: Duration::from_millis(1),
            warp: Duration::from_millis(8),
            effect: Duration::from_millis(1),
            total: Duration::from_millis(10),
            slices: 2,
            skipped_slices: 0,
            displaced_pixels: 1250,
            amplification: 0.5,
            effect_kind: Some(EffectKind::Blur),
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn displaced_percent_handles_empty_image() {
        let diag = WarpDiagnostics::default();
        assert!(diag.displaced_percent().abs() < f64::EPSILON);
        assert!((sample().displaced_percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn report_lists_every_phase() {
        let report = sample().report();
        assert!(report.contains("Warp Diagnostics Report"));
        assert!(report.contains("Prepare"));
        assert!(report.contains("2 slices"));
        assert!(report.contains("blur"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!((json["warp"].as_f64().unwrap() - 0.008).abs() < 1e-9);
        let back: WarpDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["total"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<WarpDiagnostics>(json).is_err());
    }

    #[test]
    fn web_clock_is_monotonic() {
        let clock = WebClock;
        let start = clock.now();
        assert!(clock.since(start) < Duration::from_secs(60));
    }
}
