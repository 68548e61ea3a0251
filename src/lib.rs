//! FramePump - Background Screen Capture Service
//!
//! This library keeps a continuously refreshed copy of a capture source (the
//! screen by default) and hands out frames to any number of reader threads:
//! either the cached frame, or the next frame captured after the call.
//!
//! ```no_run
//! use std::time::Duration;
//! use framepump::CaptureService;
//!
//! let service = CaptureService::open_primary_display(Duration::from_millis(100))?;
//! let cached = service.take()?;
//! let fresh = service.take_new()?;
//! assert_eq!(cached.byte_len(), fresh.byte_len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Configuration constants
pub mod config;

// Logging setup for embedding applications
pub mod logging;

// Persisted settings
pub mod settings;
pub mod settings_io;

// Platform-agnostic pixel utilities
pub mod platform_utils;

pub mod capture;

// Re-export commonly used types
pub use capture::{
    create_default_provider, CaptureError, CaptureProvider, CaptureService, Dimensions, Frame,
    Rgba, ServiceStatus, StartupError,
};
pub use settings::ServiceSettings;

#[cfg(target_os = "windows")]
pub use capture::windows::GdiCaptureProvider;

#[cfg(target_os = "macos")]
pub use capture::macos::CoreGraphicsCaptureProvider;
