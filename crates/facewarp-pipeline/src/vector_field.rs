//! Diagnostic rendering of the displacement field.
//!
//! Samples the field on a coarse grid and draws one arrow per sample
//! over a dimmed copy of the source. Arrow hue encodes direction and
//! length encodes magnitude. Detector landmarks, if any, are drawn as
//! dots. The source image is only read.

use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::field::DisplacementField;
use crate::types::{Dimensions, Displacement, Point, RgbaImage};

/// Default grid spacing in pixels.
pub const DEFAULT_GRID_STEP: u32 = 20;

/// Brightness factor applied to the background copy.
const DIM: f64 = 0.4;

/// Arrow pixels per pixel of displacement.
const ARROW_GAIN: f64 = 4.0;

const LANDMARK_COLOR: image::Rgba<u8> = image::Rgba([80, 255, 80, 255]);

/// Render the field sampled every `step` pixels.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn render_vector_field(
    source: &RgbaImage,
    field: &DisplacementField<'_>,
    landmarks: &[Point],
    step: u32,
) -> RgbaImage {
    let mut canvas = dimmed(source);
    let step = step.max(1);
    let max_len = f64::from(step) * 0.9;

    for (x, y, d) in field.sample_grid(Dimensions::of(source), step) {
        if d.is_zero() || !d.magnitude().is_finite() {
            continue;
        }
        draw_arrow(&mut canvas, f64::from(x), f64::from(y), d, max_len);
    }

    for landmark in landmarks {
        if landmark.x.is_finite() && landmark.y.is_finite() {
            let center = (landmark.x.round() as i32, landmark.y.round() as i32);
            draw_filled_circle_mut(&mut canvas, center, 2, LANDMARK_COLOR);
        }
    }
    canvas
}

fn dimmed(source: &RgbaImage) -> RgbaImage {
    let mut canvas = source.clone();
    for pixel in canvas.pixels_mut() {
        for c in 0..3 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                pixel.0[c] = (f64::from(pixel.0[c]) * DIM).round() as u8;
            }
        }
        pixel.0[3] = 255;
    }
    canvas
}

#[allow(clippy::cast_possible_truncation)]
fn draw_arrow(canvas: &mut RgbaImage, x: f64, y: f64, d: Displacement, max_len: f64) {
    let magnitude = d.magnitude();
    let length = (magnitude * ARROW_GAIN).clamp(2.0, max_len.max(2.0));
    let (ux, uy) = (d.dx / magnitude, d.dy / magnitude);
    let tip = (x + ux * length, y + uy * length);
    let color = direction_color(d);

    draw_line_segment_mut(canvas, (x as f32, y as f32), (tip.0 as f32, tip.1 as f32), color);

    let head = (length * 0.3).max(2.0);
    for angle in [2.6_f64, -2.6] {
        let (sin, cos) = angle.sin_cos();
        let hx = ux.mul_add(cos, -(uy * sin));
        let hy = ux.mul_add(sin, uy * cos);
        let end = (tip.0 + hx * head, tip.1 + hy * head);
        draw_line_segment_mut(
            canvas,
            (tip.0 as f32, tip.1 as f32),
            (end.0 as f32, end.1 as f32),
            color,
        );
    }
}

/// Fully saturated color whose hue is the displacement angle.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn direction_color(d: Displacement) -> image::Rgba<u8> {
    let hue = d.dy.atan2(d.dx).to_degrees().rem_euclid(360.0);
    let sector = hue / 60.0;
    let x = 1.0 - (sector % 2.0 - 1.0).abs();
    let (r, g, b) = match sector as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    let to_u8 = |v: f64| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    image::Rgba([to_u8(r), to_u8(g), to_u8(b), 255])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FaceGeometry;
    use crate::region::RegionModel;
    use crate::types::{FaceBox, Feature, SliderMap, WarpConfig};

    fn gray(size: u32) -> RgbaImage {
        RgbaImage::from_pixel(size, size, image::Rgba([128, 128, 128, 255]))
    }

    #[test]
    fn direction_colors() {
        assert_eq!(direction_color(Displacement::new(1.0, 0.0)).0, [255, 0, 0, 255]);
        assert_eq!(direction_color(Displacement::new(0.0, 1.0)).0, [128, 255, 0, 255]);
        assert_eq!(direction_color(Displacement::new(-1.0, 0.0)).0, [0, 255, 255, 255]);
    }

    #[test]
    fn neutral_field_renders_dimmed_copy() {
        let img = gray(100);
        let model = RegionModel::standard();
        let sliders = SliderMap::new();
        let dims = Dimensions::of(&img);
        let geometry = FaceGeometry::resolve(None, dims, &WarpConfig::default());
        let field = DisplacementField::new(&model, &sliders, geometry, 1.0);
        let out = render_vector_field(&img, &field, &[], DEFAULT_GRID_STEP);
        assert!(out.pixels().all(|p| p.0 == [51, 51, 51, 255]));
    }

    #[test]
    fn arrows_and_landmarks_are_drawn_without_touching_source() {
        let img = gray(200);
        let before = img.clone();
        let model = RegionModel::standard();
        let sliders = SliderMap::new().with(Feature::FaceWidth, 100.0);
        let dims = Dimensions::of(&img);
        let geometry = FaceGeometry::resolve(
            Some(&FaceBox::new(0.0, 0.0, 200.0, 200.0)),
            dims,
            &WarpConfig::default(),
        );
        let field = DisplacementField::new(&model, &sliders, geometry, 3.0);
        let out = render_vector_field(&img, &field, &[Point::new(5.0, 5.0)], 20);
        assert_eq!(img, before);
        assert_eq!(out.get_pixel(5, 5), &LANDMARK_COLOR);
        assert!(out.pixels().any(|p| p.0 != [51, 51, 51, 255] && *p != LANDMARK_COLOR));
    }
}
