//! Image decoding and encoding at the edge of the engine.
//!
//! The engine itself works on [`RgbaImage`] buffers. These helpers turn
//! raw file bytes (PNG, JPEG, BMP, WebP) into one and back to PNG.

use image::ImageEncoder;
use image::codecs::png::PngEncoder;

use crate::types::{RgbaImage, WarpError};

/// Decode raw image bytes into an RGBA buffer.
///
/// # Errors
///
/// Returns [`WarpError::EmptyInput`] if `bytes` is empty.
/// Returns [`WarpError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, WarpError> {
    if bytes.is_empty() {
        return Err(WarpError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Encode an RGBA buffer as PNG.
///
/// # Errors
///
/// Returns [`WarpError::ImageDecode`] if the encoder rejects the buffer.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, WarpError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}
