//! Gaussian blur confined to the face box.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`], which only accepts
//! single-channel images, by splitting the cropped region into its four
//! channels, blurring each, and writing the result back in place.

use image::GrayImage;

use crate::effect::PixelRect;
use crate::types::RgbaImage;

/// Map an intensity in `[0, 100]` linearly onto a kernel radius in
/// `[0, max_radius]`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blur_radius(intensity: f64, max_radius: u32) -> u32 {
    let t = if intensity.is_finite() {
        intensity.clamp(0.0, 100.0) / 100.0
    } else {
        0.0
    };
    ((t * f64::from(max_radius)).round() as u32).min(max_radius)
}

/// Sigma giving a kernel that effectively spans `radius` pixels.
#[allow(clippy::cast_precision_loss)]
fn sigma_for_radius(radius: u32) -> f32 {
    radius as f32 / 2.0
}

/// Blur the pixels inside `rect`. Returns `false` (and leaves the image
/// untouched) for a zero radius.
///
/// Pixels outside `rect` are neither modified nor sampled, so the
/// result is independent of what surrounds the face.
pub fn blur_region(image: &mut RgbaImage, rect: PixelRect, radius: u32) -> bool {
    if radius == 0 || rect.width == 0 || rect.height == 0 {
        return false;
    }
    let sigma = sigma_for_radius(radius);

    let channels: [GrayImage; 4] = std::array::from_fn(|c| {
        GrayImage::from_fn(rect.width, rect.height, |x, y| {
            image::Luma([image.get_pixel(rect.x + x, rect.y + y).0[c]])
        })
    });

    let blurred: [GrayImage; 4] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    for y in 0..rect.height {
        for x in 0..rect.width {
            let pixel = image.get_pixel_mut(rect.x + x, rect.y + y);
            for (c, channel) in blurred.iter().enumerate() {
                pixel.0[c] = channel.get_pixel(x, y).0[0];
            }
        }
    }
    true
}

#[cfg(test)]
#[allow(clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    fn full(image: &RgbaImage) -> PixelRect {
        PixelRect {
            x: 0,
            y: 0,
            width: image.width(),
            height: image.height(),
        }
    }

    #[test]
    fn radius_scales_linearly_and_is_capped() {
        assert_eq!(blur_radius(0.0, 24), 0);
        assert_eq!(blur_radius(50.0, 24), 12);
        assert_eq!(blur_radius(100.0, 24), 24);
        assert_eq!(blur_radius(1000.0, 24), 24);
        assert_eq!(blur_radius(-10.0, 24), 0);
        assert_eq!(blur_radius(f64::INFINITY, 24), 0);
    }

    #[test]
    fn zero_radius_returns_identical_image() {
        let mut img = RgbaImage::from_fn(4, 4, |x, _| image::Rgba([x as u8 * 60, 0, 0, 255]));
        let before = img.clone();
        let rect = full(&img);
        assert!(!blur_region(&mut img, rect, 0));
        assert_eq!(img, before);
    }

    #[test]
    fn blur_smooths_sharp_color_edge() {
        let mut img = RgbaImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        let rect = full(&img);
        assert!(blur_region(&mut img, rect, 4));

        let left = img.get_pixel(4, 5).0[0];
        let right = img.get_pixel(5, 5).0[0];
        assert!(left < 255, "expected red to decrease near boundary, got {left}");
        assert!(right > 0, "expected red to increase near boundary, got {right}");
    }

    #[test]
    fn uniform_region_unchanged_by_blur() {
        let mut img = RgbaImage::from_fn(10, 10, |_, _| image::Rgba([100, 150, 200, 250]));
        let rect = full(&img);
        blur_region(&mut img, rect, 6);
        let expected: [u8; 4] = [100, 150, 200, 250];
        for pixel in img.pixels() {
            for (c, &exp) in expected.iter().enumerate() {
                let diff = i16::from(pixel.0[c]) - i16::from(exp);
                assert!(diff.abs() <= 1, "channel {c}: expected ~{exp}, got {}", pixel.0[c]);
            }
        }
    }

    #[test]
    fn pixels_outside_rect_untouched() {
        let mut img = RgbaImage::from_fn(12, 12, |x, y| {
            image::Rgba([(x * 20) as u8, (y * 20) as u8, 0, 255])
        });
        let before = img.clone();
        let rect = PixelRect {
            x: 3,
            y: 3,
            width: 5,
            height: 5,
        };
        assert!(blur_region(&mut img, rect, 3));
        for (x, y, p) in img.enumerate_pixels() {
            if !(3..8).contains(&x) || !(3..8).contains(&y) {
                assert_eq!(p, before.get_pixel(x, y));
            }
        }
    }
}
