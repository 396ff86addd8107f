//! Pixelation confined to the face box.
//!
//! Blocks are aligned to the top-left corner of the rectangle. Each
//! block is filled with the rounded mean color of its source pixels;
//! blocks clipped by the rectangle edge average only the pixels they
//! cover. Alpha is left as it was.

use crate::effect::PixelRect;
use crate::types::RgbaImage;

/// Smallest block that still reads as pixelation.
pub const MIN_BLOCK: u32 = 2;

/// Map an intensity in `[0, 100]` linearly onto a block size in
/// `[MIN_BLOCK, max_block]`. Zero intensity gives `0` (no effect).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn block_size(intensity: f64, max_block: u32) -> u32 {
    if !intensity.is_finite() || intensity <= 0.0 {
        return 0;
    }
    let max_block = max_block.max(MIN_BLOCK);
    let t = intensity.min(100.0) / 100.0;
    ((t * f64::from(max_block)).round() as u32).clamp(MIN_BLOCK, max_block)
}

/// Pixelate `rect` with square blocks of `block` pixels.
///
/// Returns `false` without touching the image when `block < 2`.
pub fn pixelate_region(image: &mut RgbaImage, rect: PixelRect, block: u32) -> bool {
    if block < MIN_BLOCK || rect.width == 0 || rect.height == 0 {
        return false;
    }

    for by in (rect.y..rect.bottom()).step_by(block as usize) {
        let y_end = (by + block).min(rect.bottom());
        for bx in (rect.x..rect.right()).step_by(block as usize) {
            let x_end = (bx + block).min(rect.right());

            let mut sum = [0u64; 3];
            for y in by..y_end {
                for x in bx..x_end {
                    let p = image.get_pixel(x, y).0;
                    for c in 0..3 {
                        sum[c] += u64::from(p[c]);
                    }
                }
            }
            let count = u64::from(x_end - bx) * u64::from(y_end - by);
            let mean = sum.map(|s| rounded_mean(s, count));

            for y in by..y_end {
                for x in bx..x_end {
                    let pixel = image.get_pixel_mut(x, y);
                    pixel.0[..3].copy_from_slice(&mean);
                }
            }
        }
    }
    true
}

/// `round(sum / count)` with halves rounded up.
#[allow(clippy::cast_possible_truncation)]
fn rounded_mean(sum: u64, count: u64) -> u8 {
    ((sum * 2 + count) / (count * 2)).min(255) as u8
}
