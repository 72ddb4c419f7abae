/// Render module - renderer orchestration, render targets, layouts,
/// command recording and per-frame uniform staging

pub mod layout;
pub mod pipeline;
pub mod push_buffer;
pub mod recorder;
pub mod renderer;
pub mod target;

pub use layout::*;
pub use pipeline::*;
pub use push_buffer::*;
pub use recorder::*;
pub use renderer::*;
pub use target::*;
