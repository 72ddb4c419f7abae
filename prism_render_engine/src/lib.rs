/*!
# Prism 3D Render Engine

Render-pass orchestration for the Prism 3D engine.

This crate owns everything between "I have a window (or offscreen size) and a
pass structure" and "a finished frame was submitted": renderer lifecycle,
per-frame recording, parallel secondary command-buffer recording, dynamic
uniform streaming and pipeline tracking across MSAA changes. GPU backends
implement the trait contracts in [`gpu`]; the windowing layer implements
[`window::RenderWindow`].

## Architecture

- **Renderer**: owns one render pass over one target; drives the
  begin / next_subpass / submit / end frame sequence
- **RenderLayout**: backend-agnostic description of attachments and subpasses
- **RenderTarget**: the images, views and framebuffers a renderer draws into
- **CommandRecorder / CommandList**: subpass-scoped secondary recording,
  safe to run on worker threads
- **UniformPushBuffer**: per-frame bump allocator over one uniform buffer
- **Pipeline**: caller-owned pipeline, rebuilt by its renderer on MSAA changes

Backend implementations provide concrete types for the traits in [`gpu`];
[`gpu::mock`] ships a recording mock so everything above is testable without
a GPU.
*/

// Internal modules
mod error;
pub mod gpu;
pub mod log;
pub mod render;
pub mod window;

// Main prism3d namespace module
pub mod prism3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging sub-module (types and sinks only, NOT macros)
    pub mod log {
        pub use crate::log::{
            reset_logger, set_logger, write, write_detailed, DefaultLogger, LogEntry, LogSeverity,
            Logger,
        };
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    // GPU backend contract sub-module
    pub mod gpu {
        pub use crate::gpu::*;
    }

    // Render sub-module with all rendering types
    pub mod render {
        pub use crate::render::*;
    }

    // Windowing contract sub-module
    pub mod window {
        pub use crate::window::*;
    }
}
