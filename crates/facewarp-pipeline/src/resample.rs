//! Resampler: reads each displaced destination pixel from the source
//! buffer at a sub-pixel coordinate.
//!
//! The sample coordinate `(x - dx, y - dy)` is clamped so it stays at
//! least `safety_margin` pixels inside the buffer, and every neighbor
//! index is clamped again before it is read, so no read can leave the
//! buffer. Color channels are interpolated; alpha is copied from the
//! nearest source pixel.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::field::DisplacementField;
use crate::types::{CHANNELS, Displacement, Interpolation, RgbaImage};

/// Bounded per-channel noise added to resampled pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Noise {
    /// Maximum absolute offset per channel.
    pub level: u8,
    /// Generator seed.
    pub seed: u64,
}

impl Noise {
    /// No noise.
    pub const OFF: Self = Self { level: 0, seed: 0 };

    /// Generator for row `y`.
    ///
    /// Keyed by row so the output does not depend on how rows are
    /// grouped into slices.
    #[must_use]
    pub fn row_rng(self, y: u32) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ u64::from(y).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Offset each color channel by a uniform value in
    /// `[-level, level]`, then clamp.
    pub fn apply(self, pixel: [u8; 4], rng: &mut StdRng) -> [u8; 4] {
        if self.level == 0 {
            return pixel;
        }
        let level = i16::from(self.level);
        let mut out = pixel;
        for channel in out.iter_mut().take(3) {
            let offset: i16 = rng.random_range(-level..=level);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                *channel = (i16::from(*channel) + offset).clamp(0, 255) as u8;
            }
        }
        out
    }
}

/// Sub-pixel sampler over an immutable source image.
#[derive(Debug, Clone, Copy)]
pub struct Resampler<'a> {
    source: &'a RgbaImage,
    interpolation: Interpolation,
    x_bounds: (f64, f64),
    y_bounds: (f64, f64),
}

impl<'a> Resampler<'a> {
    /// Create a resampler. `safety_margin` is shrunk automatically for
    /// images too small to honor it.
    #[must_use]
    pub fn new(source: &'a RgbaImage, interpolation: Interpolation, safety_margin: u32) -> Self {
        Self {
            source,
            interpolation,
            x_bounds: axis_bounds(source.width(), safety_margin),
            y_bounds: axis_bounds(source.height(), safety_margin),
        }
    }

    /// The clamped source coordinate read for destination `(x, y)`.
    #[must_use]
    pub fn sample_coordinate(&self, x: f64, y: f64, d: Displacement) -> (f64, f64) {
        let sx = clamp_finite(x - d.dx, self.x_bounds);
        let sy = clamp_finite(y - d.dy, self.y_bounds);
        (sx, sy)
    }

    /// Resampled pixel for destination `(x, y)` displaced by `d`.
    #[must_use]
    pub fn sample(&self, x: u32, y: u32, d: Displacement) -> [u8; 4] {
        let (sx, sy) = self.sample_coordinate(f64::from(x), f64::from(y), d);
        let rgb = match self.interpolation {
            Interpolation::Bilinear => self.bilinear(sx, sy),
            Interpolation::Bicubic => self.bicubic(sx, sy),
        };
        #[allow(clippy::cast_possible_truncation)]
        let alpha = self.pixel(sx.round() as i64, sy.round() as i64)[3];
        [round_channel(rgb[0]), round_channel(rgb[1]), round_channel(rgb[2]), alpha]
    }

    /// Source pixel with indices clamped to the buffer.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn pixel(&self, x: i64, y: i64) -> [u8; 4] {
        let cx = x.clamp(0, i64::from(self.source.width()) - 1) as u32;
        let cy = y.clamp(0, i64::from(self.source.height()) - 1) as u32;
        self.source.get_pixel(cx, cy).0
    }

    #[allow(clippy::cast_possible_truncation)]
    fn bilinear(&self, sx: f64, sy: f64) -> [f64; 3] {
        let x0 = sx.floor();
        let y0 = sy.floor();
        let fx = sx - x0;
        let fy = sy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let weights = [
            ((x0, y0), (1.0 - fx) * (1.0 - fy)),
            ((x0 + 1, y0), fx * (1.0 - fy)),
            ((x0, y0 + 1), (1.0 - fx) * fy),
            ((x0 + 1, y0 + 1), fx * fy),
        ];
        let mut out = [0.0; 3];
        for ((px, py), w) in weights {
            if w == 0.0 {
                continue;
            }
            let p = self.pixel(px, py);
            for c in 0..3 {
                out[c] += f64::from(p[c]) * w;
            }
        }
        out
    }

    #[allow(clippy::cast_possible_truncation)]
    fn bicubic(&self, sx: f64, sy: f64) -> [f64; 3] {
        let x0 = sx.floor();
        let y0 = sy.floor();
        let wx = catmull_rom_weights(sx - x0);
        let wy = catmull_rom_weights(sy - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let mut out = [0.0; 3];
        for (j, wyj) in wy.iter().enumerate() {
            if *wyj == 0.0 {
                continue;
            }
            let py = y0 - 1 + j as i64;
            for (i, wxi) in wx.iter().enumerate() {
                let w = wxi * wyj;
                if w == 0.0 {
                    continue;
                }
                let p = self.pixel(x0 - 1 + i as i64, py);
                for c in 0..3 {
                    out[c] += f64::from(p[c]) * w;
                }
            }
        }
        out
    }
}

/// Catmull-Rom weights for the four taps at offsets `-1, 0, 1, 2`.
///
/// At `t = 0` the weights are exactly `[0, 1, 0, 0]`.
fn catmull_rom_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        (-t3 + 2.0 * t2 - t) * 0.5,
        (3.0 * t3 - 5.0 * t2 + 2.0) * 0.5,
        (-3.0 * t3 + 4.0 * t2 + t) * 0.5,
        (t3 - t2) * 0.5,
    ]
}

/// `[margin, len - margin - 1]`, collapsed to the axis center when the
/// axis is too short.
fn axis_bounds(len: u32, margin: u32) -> (f64, f64) {
    let last = f64::from(len.saturating_sub(1));
    let lo = f64::from(margin);
    let hi = last - lo;
    if hi < lo {
        let mid = last / 2.0;
        (mid, mid)
    } else {
        (lo, hi)
    }
}

fn clamp_finite(v: f64, (lo, hi): (f64, f64)) -> f64 {
    if v.is_nan() { lo } else { v.clamp(lo, hi) }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Warp the rows in `rows`, writing into `dest`.
///
/// `dest` holds exactly those rows (`rows.len() * width * 4` bytes) and
/// must already contain a copy of the matching source rows; pixels with
/// zero displacement are left untouched. Returns the number of pixels
/// that were resampled.
#[allow(clippy::cast_possible_truncation)]
pub fn warp_rows(
    field: &DisplacementField<'_>,
    resampler: &Resampler<'_>,
    noise: Noise,
    rows: Range<u32>,
    dest: &mut [u8],
) -> u64 {
    let width = resampler.source.width();
    let stride = width as usize * CHANNELS;
    let (col_start, col_end) = field.column_span(width);
    let mut displaced = 0;

    for (row_index, y) in rows.enumerate() {
        if field.row_is_outside(f64::from(y)) {
            continue;
        }
        let mut rng = (noise.level > 0).then(|| noise.row_rng(y));
        let row = &mut dest[row_index * stride..(row_index + 1) * stride];
        for x in col_start..col_end {
            let d = field.at(f64::from(x), f64::from(y));
            if d.is_zero() {
                continue;
            }
            let mut pixel = resampler.sample(x, y, d);
            if let Some(rng) = rng.as_mut() {
                pixel = noise.apply(pixel, rng);
            }
            let offset = x as usize * CHANNELS;
            row[offset..offset + CHANNELS].copy_from_slice(&pixel);
            displaced += 1;
        }
    }
    displaced
}
