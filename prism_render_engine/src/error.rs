//! Error types for the Prism3D render core
//!
//! This module defines the error types used throughout the crate, covering
//! usage errors (contract violations), capability errors, and fatal backend
//! failures. Uniform push-buffer overflow is deliberately NOT an error: it
//! is an expected condition reported as a value (see `UniformPushBuffer`).

use std::fmt;

/// Result type for Prism3D operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prism3D render core errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific failure (device lost, allocation failure, ...).
    /// These indicate the device/session is no longer usable; no retry.
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Programmer contract violation: recording-state operations out of
    /// order, foreign/stale command lists, subpass bounds, reconfiguration
    /// while recording. Fails fast at the call site.
    InvalidOperation(String),

    /// Capability error: unsupported MSAA level, layout/surface format
    /// mismatch. Surfaced at construction/configuration time.
    Unsupported(String),

    /// Initialization failed (renderer construction, collaborator setup)
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Error::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Log an error through the engine logger and bail out of the current
/// function with [`Error::InvalidOperation`].
///
/// # Example
///
/// ```no_run
/// # use prism_render_engine::{engine_bail, prism3d::Result};
/// # fn check(recording: bool) -> Result<()> {
/// if recording {
///     engine_bail!("prism3d::Renderer", "set_msaa called while recording");
/// }
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {{
        $crate::engine_error!($source, $($arg)*);
        return Err($crate::prism3d::Error::InvalidOperation(format!($($arg)*)));
    }};
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
