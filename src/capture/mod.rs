// capture/mod.rs - Frame Capture Module
//
// This module provides the background capture service, the frame types it hands
// out, and the provider trait that platform backends implement.
// Each platform has its own submodule with the actual pixel acquisition.

pub mod error;
pub mod service;

#[cfg(target_os = "windows")]
pub mod windows;
#[cfg(target_os = "windows")]
pub use windows::GdiCaptureProvider;

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "macos")]
pub use macos::CoreGraphicsCaptureProvider;

pub use error::{CaptureError, StartupError};
pub use service::{CaptureService, ServiceStatus};

use bytemuck::{Pod, Zeroable};

use crate::config::capture::BYTES_PER_PIXEL;

/// One pixel, stored as red, green, blue, alpha in that byte order
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl From<[u8; 4]> for Rgba {
    fn from(value: [u8; 4]) -> Self {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<Rgba> for [u8; 4] {
    fn from(value: Rgba) -> Self {
        [value.r, value.g, value.b, value.a]
    }
}

/// Size of a capture target in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels, or `None` if it does not fit in memory
    pub fn pixel_count(&self) -> Option<usize> {
        (self.width as usize).checked_mul(self.height as usize)
    }

    /// Length of an RGBA byte buffer with these dimensions
    pub fn byte_len(&self) -> Option<usize> {
        self.pixel_count()?.checked_mul(BYTES_PER_PIXEL)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A complete captured frame.
///
/// Pixels are row-major, top row first, `width * height` long.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl Frame {
    /// Zero-filled frame of the given size.
    ///
    /// Callers must check `dimensions.pixel_count()` first; the service does so
    /// at construction.
    pub fn new(dimensions: Dimensions) -> Self {
        let len = dimensions.pixel_count().unwrap_or(0);
        Self {
            width: dimensions.width,
            height: dimensions.height,
            pixels: vec![Rgba::default(); len],
        }
    }

    /// Wrap existing pixels. Returns `None` when the length does not match.
    pub fn from_pixels(dimensions: Dimensions, pixels: Vec<Rgba>) -> Option<Self> {
        if dimensions.pixel_count() != Some(pixels.len()) {
            return None;
        }
        Some(Self {
            width: dimensions.width,
            height: dimensions.height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    /// Raw RGBA bytes (`width * height * 4` long)
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.pixels)
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len() * BYTES_PER_PIXEL
    }

    /// Pixel at column `x`, row `y` (row 0 is the top)
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = y as usize * self.width as usize + x as usize;
        self.pixels.get(index).copied()
    }

    pub fn into_pixels(self) -> Vec<Rgba> {
        self.pixels
    }

    /// Overwrite this frame with `source`, reusing the allocation when possible
    pub(crate) fn copy_from(&mut self, source: &Frame) {
        self.width = source.width;
        self.height = source.height;
        self.pixels.clone_from(&source.pixels);
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixels", &self.pixels.len())
            .finish()
    }
}

/// Trait for pixel sources driven by [`CaptureService`]
///
/// A provider is moved onto the service's background thread and is only ever
/// called from there.
pub trait CaptureProvider: Send + 'static {
    /// Fixed size of every frame this provider produces.
    ///
    /// Queried once when the service is constructed. If the underlying source
    /// changes size afterwards, later `capture` results are undefined from the
    /// service's point of view.
    fn dimensions(&self) -> Dimensions;

    /// Fill `destination` with one frame
    ///
    /// # Parameters
    /// - `destination`: `width * height * 4` bytes, RGBA, row-major, top row first
    fn capture(&mut self, destination: &mut [u8]) -> Result<(), CaptureError>;
}

impl CaptureProvider for Box<dyn CaptureProvider> {
    fn dimensions(&self) -> Dimensions {
        (**self).dimensions()
    }

    fn capture(&mut self, destination: &mut [u8]) -> Result<(), CaptureError> {
        (**self).capture(destination)
    }
}

/// Create the capture provider for the primary display of this platform
pub fn create_default_provider() -> Result<Box<dyn CaptureProvider>, CaptureError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::GdiCaptureProvider::new()?))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::CoreGraphicsCaptureProvider::new()?))
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        log::warn!("No screen capture backend for this platform");
        Err(CaptureError::DeviceUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_is_four_bytes_in_order() {
        assert_eq!(std::mem::size_of::<Rgba>(), 4);
        let pixels = [Rgba::new(1, 2, 3, 4), Rgba::new(5, 6, 7, 8)];
        let bytes: &[u8] = bytemuck::cast_slice(&pixels);
        assert_eq!(bytes, &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn frame_indexes_row_major_from_top() {
        let dims = Dimensions::new(2, 2);
        let pixels = vec![
            Rgba::new(0, 0, 0, 255),
            Rgba::new(1, 0, 0, 255),
            Rgba::new(0, 1, 0, 255),
            Rgba::new(1, 1, 0, 255),
        ];
        let frame = Frame::from_pixels(dims, pixels).unwrap();
        assert_eq!(frame.pixel(1, 0), Some(Rgba::new(1, 0, 0, 255)));
        assert_eq!(frame.pixel(0, 1), Some(Rgba::new(0, 1, 0, 255)));
        assert_eq!(frame.pixel(2, 0), None);
        assert_eq!(frame.byte_len(), 16);
        assert_eq!(frame.as_bytes().len(), 16);
    }

    #[test]
    fn from_pixels_rejects_wrong_length() {
        let dims = Dimensions::new(3, 1);
        assert!(Frame::from_pixels(dims, vec![Rgba::default(); 2]).is_none());
    }

    #[test]
    fn copy_from_adopts_source_size() {
        let source = Frame::from_pixels(Dimensions::new(1, 1), vec![Rgba::new(9, 9, 9, 9)]).unwrap();
        let mut target = Frame::new(Dimensions::new(4, 4));
        target.copy_from(&source);
        assert_eq!(target, source);
    }

    #[test]
    fn dimension_overflow_is_detected() {
        let dims = Dimensions::new(u32::MAX, u32::MAX);
        assert!(dims.byte_len().is_none());
        assert!(Dimensions::new(0, 5).is_empty());
    }
}
