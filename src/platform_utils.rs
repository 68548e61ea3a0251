//! Platform-agnostic pixel utilities
//!
//! Helpers that platform providers use to bring native pixel layouts into the
//! RGBA order the capture service hands out.

use crate::config::capture::BYTES_PER_PIXEL;

/// Swap the red and blue channels of every pixel in place
///
/// Converts BGRA (GDI, most Windows APIs) to RGBA and back.
pub fn bgra_to_rgba_in_place(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
        px.swap(0, 2);
    }
}

/// Set the alpha channel of every RGBA pixel to 255
///
/// GDI leaves the fourth byte of a 32-bit screen copy undefined.
pub fn force_opaque(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
        px[3] = 255;
    }
}

/// Byte length of an RGBA frame, or `None` on overflow
pub fn frame_byte_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)
}

/// Validate capture dimensions
///
/// # Returns
/// `Ok(())` if both sides are nonzero and the frame fits in memory
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), String> {
    if width == 0 || height == 0 {
        return Err(format!("Capture size {}x{} has an empty side", width, height));
    }
    if frame_byte_len(width, height).is_none() {
        return Err(format!("Capture size {}x{} is too large", width, height));
    }
    Ok(())
}

/// Convert a platform dimension (signed on Win32) to `u32`, treating nonpositive
/// values as zero
pub fn dimension_from_i32(value: i32) -> u32 {
    value.max(0) as u32
}
