//! Mask-image overlay composited over the face box.

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::effect::PixelRect;
use crate::types::{Point, RgbaImage, WarpError, rgba_from_raw};

/// Largest mask width, as a multiple of the face box width.
pub const MAX_MASK_SCALE: f64 = 4.0;

/// Caller-supplied RGBA mask image.
///
/// Serialized as `{width, height, data}` so it can travel inside a
/// worker request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MaskImageWire", into = "MaskImageWire")]
pub struct MaskImage(RgbaImage);

#[derive(Serialize, Deserialize)]
struct MaskImageWire {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl TryFrom<MaskImageWire> for MaskImage {
    type Error = WarpError;

    fn try_from(wire: MaskImageWire) -> Result<Self, Self::Error> {
        rgba_from_raw(wire.width, wire.height, wire.data).map(Self)
    }
}

impl From<MaskImage> for MaskImageWire {
    fn from(mask: MaskImage) -> Self {
        Self {
            width: mask.0.width(),
            height: mask.0.height(),
            data: mask.0.into_raw(),
        }
    }
}

impl MaskImage {
    /// Wrap an image.
    #[must_use]
    pub const fn new(image: RgbaImage) -> Self {
        Self(image)
    }

    /// The wrapped image.
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        &self.0
    }
}

impl From<RgbaImage> for MaskImage {
    fn from(image: RgbaImage) -> Self {
        Self(image)
    }
}

/// One axis of the visible part of a scaled mask.
///
/// Maps target coordinates (pixels of the mask scaled to its full
/// on-screen size) to pixels of a resized crop covering only the
/// visible window.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisWindow {
    /// First source pixel of the crop.
    src_start: u32,
    /// Source pixels in the crop.
    src_len: u32,
    /// Length of the resized crop.
    len: u32,
    /// Target coordinate where the crop starts.
    origin: f64,
    /// Resized crop pixels per target pixel.
    density: f64,
}

impl AxisWindow {
    /// Window covering target pixels `[start, end)` of a mask axis of
    /// `src` pixels scaled to `target` pixels.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn new(start: i64, end: i64, target: f64, src: u32) -> Self {
        let ratio = f64::from(src) / target;
        let src_start = ((start as f64 * ratio).floor().max(0.0) as u32).min(src - 1);
        let src_end = ((end as f64 * ratio).ceil() as u32).clamp(src_start + 1, src);
        let src_len = src_end - src_start;
        let span = f64::from(src_len) / ratio;
        let len = span.round().max(1.0) as u32;
        Self {
            src_start,
            src_len,
            len,
            origin: f64::from(src_start) / ratio,
            density: f64::from(len) / span,
        }
    }

    /// Index into the resized crop for target pixel `t`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn index(&self, t: i64) -> u32 {
        let i = ((t as f64 - self.origin) * self.density).floor().max(0.0) as u32;
        i.min(self.len - 1)
    }
}

/// Composite `mask` over `rect`.
///
/// The mask is scaled to `scale` times the rectangle width, keeping
/// its aspect ratio, and centered on `position` (fractions of `rect`).
/// Only the part that lands inside `rect` is resized, so the cost is
/// bounded by the rectangle whatever the mask's shape. Its alpha is
/// multiplied by `opacity`; destination pixels outside `rect` are never
/// written. Returns `false` when nothing was drawn.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn composite_mask(
    image: &mut RgbaImage,
    rect: PixelRect,
    mask: &MaskImage,
    position: Point,
    scale: f64,
    opacity: f64,
) -> bool {
    let source = mask.image();
    if source.width() == 0 || source.height() == 0 || !opacity.is_finite() || opacity <= 0.0 {
        return false;
    }
    let opacity = opacity.min(1.0);
    let scale = if scale.is_finite() { scale.clamp(0.0, MAX_MASK_SCALE) } else { 1.0 };

    let target_w = (f64::from(rect.width) * scale).round();
    let target_h = (target_w * f64::from(source.height()) / f64::from(source.width())).round();
    if target_w < 1.0 || target_h < 1.0 {
        return false;
    }

    let px = if position.x.is_finite() { position.x } else { 0.5 };
    let py = if position.y.is_finite() { position.y } else { 0.5 };
    let center_x = f64::from(rect.width).mul_add(px, f64::from(rect.x));
    let center_y = f64::from(rect.height).mul_add(py, f64::from(rect.y));
    let left = (center_x - target_w / 2.0).round() as i64;
    let top = (center_y - target_h / 2.0).round() as i64;

    let x_start = left.max(i64::from(rect.x));
    let x_end = (left + target_w as i64).min(i64::from(rect.right()));
    let y_start = top.max(i64::from(rect.y));
    let y_end = (top + target_h as i64).min(i64::from(rect.bottom()));
    if x_start >= x_end || y_start >= y_end {
        return false;
    }

    let cols = AxisWindow::new(x_start - left, x_end - left, target_w, source.width());
    let rows = AxisWindow::new(y_start - top, y_end - top, target_h, source.height());
    let crop = imageops::crop_imm(
        source,
        cols.src_start,
        rows.src_start,
        cols.src_len,
        rows.src_len,
    )
    .to_image();
    let resized = imageops::resize(&crop, cols.len, rows.len, FilterType::Triangle);

    for y in y_start..y_end {
        let my = rows.index(y - top);
        for x in x_start..x_end {
            let m = resized.get_pixel(cols.index(x - left), my).0;
            let alpha = f64::from(m[3]) / 255.0 * opacity;
            if alpha <= 0.0 {
                continue;
            }
            let dst = image.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                let blended = f64::from(m[c]).mul_add(alpha, f64::from(dst.0[c]) * (1.0 - alpha));
                dst.0[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
            let out_alpha = (255.0 - f64::from(dst.0[3])).mul_add(alpha, f64::from(dst.0[3]));
            dst.0[3] = out_alpha.round().clamp(0.0, 255.0) as u8;
        }
    }
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba(rgba))
    }

    const RECT: PixelRect = PixelRect {
        x: 10,
        y: 10,
        width: 20,
        height: 20,
    };

    #[test]
    fn full_opacity_mask_replaces_pixels() {
        let mut img = solid(40, 40, [0, 0, 0, 255]);
        let mask = MaskImage::new(solid(4, 4, [200, 100, 50, 255]));
        assert!(composite_mask(&mut img, RECT, &mask, Point::new(0.5, 0.5), 1.0, 1.0));
        assert_eq!(img.get_pixel(20, 20).0, [200, 100, 50, 255]);
    }

    #[test]
    fn half_opacity_blends() {
        let mut img = solid(40, 40, [0, 0, 0, 255]);
        let mask = MaskImage::new(solid(4, 4, [200, 100, 50, 255]));
        assert!(composite_mask(&mut img, RECT, &mask, Point::new(0.5, 0.5), 1.0, 0.5));
        assert_eq!(img.get_pixel(20, 20).0, [100, 50, 25, 255]);
    }

    #[test]
    fn mask_is_clipped_to_rect() {
        let mut img = solid(40, 40, [0, 0, 0, 255]);
        let before = img.clone();
        let mask = MaskImage::new(solid(4, 4, [255, 255, 255, 255]));
        assert!(composite_mask(&mut img, RECT, &mask, Point::new(0.5, 0.5), 3.0, 1.0));
        for (x, y, p) in img.enumerate_pixels() {
            let inside = (10..30).contains(&x) && (10..30).contains(&y);
            if inside {
                assert_eq!(p.0, [255, 255, 255, 255]);
            } else {
                assert_eq!(p, before.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn position_moves_mask() {
        let mut img = solid(40, 40, [0, 0, 0, 255]);
        let mask = MaskImage::new(solid(2, 2, [255, 0, 0, 255]));
        // Width 10 centered at the top-left corner of the rect.
        assert!(composite_mask(&mut img, RECT, &mask, Point::new(0.0, 0.0), 0.5, 1.0));
        assert_eq!(img.get_pixel(12, 12).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(25, 25).0, [0, 0, 0, 255]);
    }

    #[test]
    fn transparent_mask_pixels_leave_image() {
        let mut img = solid(40, 40, [9, 9, 9, 255]);
        let before = img.clone();
        let mask = MaskImage::new(solid(4, 4, [255, 255, 255, 0]));
        composite_mask(&mut img, RECT, &mask, Point::new(0.5, 0.5), 1.0, 1.0);
        assert_eq!(img, before);
    }

    #[test]
    fn zero_opacity_or_scale_draws_nothing() {
        let mut img = solid(40, 40, [0, 0, 0, 255]);
        let mask = MaskImage::new(solid(4, 4, [255, 255, 255, 255]));
        assert!(!composite_mask(&mut img, RECT, &mask, Point::new(0.5, 0.5), 1.0, 0.0));
        assert!(!composite_mask(&mut img, RECT, &mask, Point::new(0.5, 0.5), 0.0, 1.0));
    }

    #[test]
    fn tall_thin_mask_resizes_only_the_visible_window() {
        // Scaled to the rect width, this mask would be 300 x 450_000.
        let mut img = solid(300, 300, [0, 0, 0, 255]);
        let mask = MaskImage::new(RgbaImage::from_fn(1, 1500, |_, y| {
            if y < 750 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        }));
        let rect = PixelRect {
            x: 0,
            y: 0,
            width: 300,
            height: 300,
        };
        assert!(composite_mask(&mut img, rect, &mask, Point::new(0.5, 0.5), 1.0, 1.0));
        // The visible window is the middle of the mask, where red meets blue.
        let top = img.get_pixel(150, 0).0;
        let bottom = img.get_pixel(150, 299).0;
        assert!(top[0] > 250 && top[2] < 5, "{top:?}");
        assert!(bottom[2] > 250 && bottom[0] < 5, "{bottom:?}");

        let rows = AxisWindow::new(224_850, 225_150, 450_000.0, 1500);
        assert!(rows.src_len <= 3);
        assert!(rows.len <= 3 * 300);
    }

    #[test]
    fn axis_window_matches_full_resize_when_fully_visible() {
        let w = AxisWindow::new(0, 20, 20.0, 4);
        assert_eq!((w.src_start, w.src_len, w.len), (0, 4, 20));
        assert!((0..20).all(|t| w.index(t) == u32::try_from(t).unwrap()));

        // 2 px scaled to 10, only the right half visible.
        let w = AxisWindow::new(5, 10, 10.0, 2);
        assert_eq!((w.src_start, w.src_len, w.len), (1, 1, 5));
        assert_eq!(w.index(5), 0);
        assert_eq!(w.index(9), 4);
    }

    #[test]
    fn wire_format_validates_length() {
        let ok: MaskImage =
            serde_json::from_str(r#"{"width":1,"height":1,"data":[1,2,3,4]}"#).unwrap();
        assert_eq!(ok.image().get_pixel(0, 0).0, [1, 2, 3, 4]);
        let bad = serde_json::from_str::<MaskImage>(r#"{"width":2,"height":1,"data":[1,2,3,4]}"#);
        assert!(bad.is_err());
    }
}
