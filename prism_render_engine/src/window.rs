/// RenderWindow trait - windowing collaborator contract
///
/// Surface and swapchain creation live outside the render core. A renderer
/// consumes the window through this narrow interface only: surface format,
/// current size, backbuffer views to build framebuffers over, acquire and
/// present, plus the one-renderer-per-window flag.

use std::sync::Arc;

use crate::error::Result;
use crate::gpu::{Extent2d, GpuImageView, TextureFormat};

/// Window surface consumed by a window-backed renderer
pub trait RenderWindow: Send + Sync {
    /// Pixel format of the window surface
    fn surface_format(&self) -> TextureFormat;

    /// Current surface size in pixels
    fn size(&self) -> Extent2d;

    /// Number of backbuffer images in the swapchain
    fn backbuffer_count(&self) -> usize;

    /// View over backbuffer image `index`
    ///
    /// Valid `index` range is `0..backbuffer_count()`. Views are replaced
    /// when the windowing layer recreates the swapchain; the renderer
    /// re-reads them during `notify_resize`.
    fn backbuffer_view(&self, index: usize) -> Arc<dyn GpuImageView>;

    /// Whether a renderer is already attached to this window
    ///
    /// At most one Renderer may target a window; `Renderer` construction
    /// checks and sets this flag, disposal clears it.
    fn has_renderer(&self) -> bool;

    /// Set or clear the renderer-attached flag
    fn set_has_renderer(&self, attached: bool);

    /// Acquire the next backbuffer image to render into
    ///
    /// # Returns
    ///
    /// The index of the acquired image (used for `present`)
    fn acquire_next_image(&self) -> Result<u32>;

    /// Present backbuffer image `image_index` to the surface
    fn present(&self, image_index: u32) -> Result<()>;
}
