/// GPU device collaborator contract
///
/// The render core never talks to a graphics API directly. Everything it
/// needs from the device (command-buffer allocation, render-pass and
/// framebuffer creation, descriptor allocation/updates, queue submission,
/// fences, device-idle waits) is expressed as the traits in this module.
/// Backend crates implement them; `gpu::mock` provides a GPU-free
/// implementation for tests.

pub mod command_buffer;
pub mod descriptor;
pub mod device;
pub mod mock;
pub mod render_pass;

pub use command_buffer::*;
pub use descriptor::*;
pub use device::*;
pub use render_pass::*;
