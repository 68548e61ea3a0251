// capture/windows.rs - Windows GDI Screen Capture Implementation
//
// Copies the whole virtual screen (all monitors) with BitBlt into a memory
// bitmap, then reads it back top-down with GetDIBits.
// GDI objects are created on the first capture, i.e. on the service's
// background thread, and released when the provider is dropped there.

use log::{debug, info, warn};
use windows::Win32::Foundation::GetLastError;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC,
    HGDIOBJ, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN,
};

use super::{CaptureError, CaptureProvider, Dimensions};
use crate::platform_utils::{bgra_to_rgba_in_place, dimension_from_i32, force_opaque};

fn last_error() -> CaptureError {
    let code = unsafe { GetLastError() };
    CaptureError::from_code(code.0)
}

/// Device contexts and bitmap for one capture size
struct GdiContext {
    screen_dc: HDC,
    memory_dc: HDC,
    bitmap: HBITMAP,
    previous: HGDIOBJ,
    info: BITMAPINFO,
}

impl GdiContext {
    fn new(width: i32, height: i32) -> Result<Self, CaptureError> {
        unsafe {
            let screen_dc = GetDC(None);
            if screen_dc.is_invalid() {
                return Err(last_error());
            }

            let memory_dc = CreateCompatibleDC(Some(screen_dc));
            if memory_dc.is_invalid() {
                let err = last_error();
                let _ = ReleaseDC(None, screen_dc);
                return Err(err);
            }

            let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            if bitmap.is_invalid() {
                let err = last_error();
                let _ = DeleteDC(memory_dc);
                let _ = ReleaseDC(None, screen_dc);
                return Err(err);
            }

            let previous = SelectObject(memory_dc, bitmap.into());
            if previous.is_invalid() {
                let err = last_error();
                let _ = DeleteObject(bitmap.into());
                let _ = DeleteDC(memory_dc);
                let _ = ReleaseDC(None, screen_dc);
                return Err(err);
            }

            let info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // Negative height: top-down rows
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };

            Ok(Self {
                screen_dc,
                memory_dc,
                bitmap,
                previous,
                info,
            })
        }
    }
}

impl Drop for GdiContext {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.memory_dc, self.previous);
            let _ = DeleteObject(self.bitmap.into());
            let _ = DeleteDC(self.memory_dc);
            let _ = ReleaseDC(None, self.screen_dc);
        }
    }
}

/// Screen capture of the Windows virtual desktop using GDI
///
/// Screen metrics are read once in [`GdiCaptureProvider::new`]. Changing the
/// display resolution afterwards is not detected.
pub struct GdiCaptureProvider {
    origin_x: i32,
    origin_y: i32,
    width: i32,
    height: i32,
    context: Option<GdiContext>,
}

// GDI handles are only touched by the thread that calls `capture`, which is the
// single capture thread the service moves this provider onto.
unsafe impl Send for GdiCaptureProvider {}

impl GdiCaptureProvider {
    pub fn new() -> Result<Self, CaptureError> {
        let (origin_x, origin_y, width, height) = unsafe {
            (
                GetSystemMetrics(SM_XVIRTUALSCREEN),
                GetSystemMetrics(SM_YVIRTUALSCREEN),
                GetSystemMetrics(SM_CXVIRTUALSCREEN),
                GetSystemMetrics(SM_CYVIRTUALSCREEN),
            )
        };

        if width <= 0 || height <= 0 {
            warn!("GetSystemMetrics returned an empty virtual screen");
            return Err(CaptureError::DeviceUnavailable);
        }

        info!(
            "GDI capture of virtual screen {}x{} at ({}, {})",
            width, height, origin_x, origin_y
        );

        Ok(Self {
            origin_x,
            origin_y,
            width,
            height,
            context: None,
        })
    }

    fn context(&mut self) -> Result<&mut GdiContext, CaptureError> {
        if self.context.is_none() {
            debug!("Creating GDI capture context");
            self.context = Some(GdiContext::new(self.width, self.height)?);
        }
        self.context.as_mut().ok_or(CaptureError::BadEnvironment)
    }
}

impl CaptureProvider for GdiCaptureProvider {
    fn dimensions(&self) -> Dimensions {
        Dimensions::new(dimension_from_i32(self.width), dimension_from_i32(self.height))
    }

    fn capture(&mut self, destination: &mut [u8]) -> Result<(), CaptureError> {
        if Some(destination.len()) != self.dimensions().byte_len() {
            return Err(CaptureError::InvalidBuffer);
        }

        let (origin_x, origin_y, width, height) =
            (self.origin_x, self.origin_y, self.width, self.height);
        let ctx = self.context()?;

        unsafe {
            BitBlt(
                ctx.memory_dc,
                0,
                0,
                width,
                height,
                Some(ctx.screen_dc),
                origin_x,
                origin_y,
                SRCCOPY,
            )
            .map_err(|_| last_error())?;

            let lines = GetDIBits(
                ctx.memory_dc,
                ctx.bitmap,
                0,
                height as u32,
                Some(destination.as_mut_ptr() as *mut std::ffi::c_void),
                &mut ctx.info,
                DIB_RGB_COLORS,
            );
            if lines == 0 {
                return Err(last_error());
            }
        }

        // GDI writes BGRX; hand out RGBA
        bgra_to_rgba_in_place(destination);
        force_opaque(destination);
        Ok(())
    }
}
