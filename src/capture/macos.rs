// capture/macos.rs - macOS CoreGraphics Screen Capture Implementation
//
// Captures the main display with CGDisplayCreateImage and draws the image into
// an RGBA bitmap context backed directly by the destination buffer.
// Requires the Screen Recording permission (System Settings > Privacy & Security).

use core_graphics::base::kCGImageAlphaPremultipliedLast;
use core_graphics::color_space::CGColorSpace;
use core_graphics::context::CGContext;
use core_graphics::display::CGDisplay;
use core_graphics::geometry::{CGPoint, CGRect, CGSize};
use log::{info, warn};

use super::{CaptureError, CaptureProvider, Dimensions};
use crate::config::capture::BYTES_PER_PIXEL;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGPreflightScreenCaptureAccess() -> bool;
}

/// Screen capture of the main display using CoreGraphics
///
/// The display's pixel size is read once in [`CoreGraphicsCaptureProvider::new`].
/// If the resolution changes later the image is scaled into the original size.
pub struct CoreGraphicsCaptureProvider {
    display: CGDisplay,
    width: u32,
    height: u32,
}

impl CoreGraphicsCaptureProvider {
    pub fn new() -> Result<Self, CaptureError> {
        let display = CGDisplay::main();
        let width = display.pixels_wide() as u32;
        let height = display.pixels_high() as u32;

        if width == 0 || height == 0 {
            warn!("Main display reported an empty size");
            return Err(CaptureError::DeviceUnavailable);
        }

        info!("CoreGraphics capture of main display {}x{}", width, height);
        Ok(Self {
            display,
            width,
            height,
        })
    }
}

impl CaptureProvider for CoreGraphicsCaptureProvider {
    fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    fn capture(&mut self, destination: &mut [u8]) -> Result<(), CaptureError> {
        if Some(destination.len()) != self.dimensions().byte_len() {
            return Err(CaptureError::InvalidBuffer);
        }

        if !unsafe { CGPreflightScreenCaptureAccess() } {
            return Err(CaptureError::AccessDenied);
        }

        // None when the display is asleep, disconnected, or permission was revoked
        let image = self.display.image().ok_or(CaptureError::DeviceUnavailable)?;

        let width = self.width as usize;
        let height = self.height as usize;
        let color_space = CGColorSpace::create_device_rgb();
        let context = CGContext::create_bitmap_context(
            Some(destination.as_mut_ptr() as *mut _),
            width,
            height,
            8,
            width * BYTES_PER_PIXEL,
            &color_space,
            kCGImageAlphaPremultipliedLast,
        );

        context.draw_image(
            CGRect {
                origin: CGPoint { x: 0.0, y: 0.0 },
                size: CGSize {
                    width: width as f64,
                    height: height as f64,
                },
            },
            &image,
        );

        Ok(())
    }
}
