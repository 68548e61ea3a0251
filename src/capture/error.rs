//! Error types for capture operations.
//!
//! Every [`CaptureError`] carries a nonzero status code. The service stores that
//! code atomically when the background loop fails and rebuilds the error from it
//! for each later consumer call, so all callers observe an equal error.

use std::num::NonZeroU32;

use thiserror::Error;

/// Status codes shared with the platform layer (Win32 system error numbering).
pub mod codes {
    pub const ACCESS_DENIED: u32 = 0x5;
    pub const NOT_ENOUGH_MEMORY: u32 = 0x8;
    pub const BAD_ENVIRONMENT: u32 = 0xA;
    pub const NOT_READY: u32 = 0x15;
    pub const BAD_LENGTH: u32 = 0x18;
}

/// Failure reported by a [`CaptureProvider`](super::CaptureProvider) or recorded
/// by a failed [`CaptureService`](super::CaptureService).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CaptureError {
    /// The capture source refused access (e.g. missing screen recording permission)
    #[error("access to the capture source was denied")]
    AccessDenied,
    /// The device or display is not available
    #[error("capture device is unavailable")]
    DeviceUnavailable,
    /// The platform ran out of memory, handles or similar resources
    #[error("capture resources are exhausted")]
    ResourceExhausted,
    /// Unexpected failure outside the platform API (including a provider panic)
    #[error("capture thread encountered an unexpected failure")]
    BadEnvironment,
    /// Destination buffer length does not match the capture dimensions
    #[error("destination buffer does not match the capture dimensions")]
    InvalidBuffer,
    /// Any other platform error code
    #[error("platform capture failure (code {:#x})", .0.get())]
    Os(NonZeroU32),
}

impl CaptureError {
    /// Nonzero status code for this error.
    pub fn code(&self) -> u32 {
        match self {
            CaptureError::AccessDenied => codes::ACCESS_DENIED,
            CaptureError::DeviceUnavailable => codes::NOT_READY,
            CaptureError::ResourceExhausted => codes::NOT_ENOUGH_MEMORY,
            CaptureError::BadEnvironment => codes::BAD_ENVIRONMENT,
            CaptureError::InvalidBuffer => codes::BAD_LENGTH,
            CaptureError::Os(code) => code.get(),
        }
    }

    /// Rebuild an error from a status code.
    ///
    /// A zero code is not an error state; it maps to `BadEnvironment` so that a
    /// platform call which failed without setting an error number still fails.
    pub fn from_code(code: u32) -> Self {
        match code {
            codes::ACCESS_DENIED => CaptureError::AccessDenied,
            codes::NOT_READY => CaptureError::DeviceUnavailable,
            codes::NOT_ENOUGH_MEMORY => CaptureError::ResourceExhausted,
            codes::BAD_ENVIRONMENT => CaptureError::BadEnvironment,
            codes::BAD_LENGTH => CaptureError::InvalidBuffer,
            other => match NonZeroU32::new(other) {
                Some(code) => CaptureError::Os(code),
                None => CaptureError::BadEnvironment,
            },
        }
    }
}

/// Failure while constructing a [`CaptureService`](super::CaptureService).
/// No background thread outlives a returned `StartupError`.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The provider reported dimensions that cannot back a frame
    #[error("capture source reported invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    /// The background capture thread could not be spawned
    #[error("failed to spawn capture thread")]
    Spawn(#[source] std::io::Error),
    /// The first capture failed
    #[error("capture service failed to start")]
    Capture(#[from] CaptureError),
}

impl StartupError {
    /// Status code of the failed first capture, if that is what failed.
    pub fn code(&self) -> Option<u32> {
        match self {
            StartupError::Capture(err) => Some(err.code()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_back_to_variant() {
        for err in [
            CaptureError::AccessDenied,
            CaptureError::DeviceUnavailable,
            CaptureError::ResourceExhausted,
            CaptureError::BadEnvironment,
            CaptureError::InvalidBuffer,
        ] {
            assert_eq!(CaptureError::from_code(err.code()), err);
        }
    }

    #[test]
    fn unknown_code_is_kept_raw() {
        let err = CaptureError::from_code(0x57);
        assert_eq!(err.code(), 0x57);
        assert!(matches!(err, CaptureError::Os(_)));
        assert_eq!(err.to_string(), "platform capture failure (code 0x57)");
    }

    #[test]
    fn zero_code_still_fails() {
        assert_eq!(CaptureError::from_code(0), CaptureError::BadEnvironment);
    }

    #[test]
    fn startup_error_exposes_capture_code() {
        let err = StartupError::from(CaptureError::AccessDenied);
        assert_eq!(err.code(), Some(codes::ACCESS_DENIED));

        let err = StartupError::InvalidDimensions { width: 0, height: 10 };
        assert_eq!(err.code(), None);
    }
}
