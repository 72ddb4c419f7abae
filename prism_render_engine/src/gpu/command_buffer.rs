/// GpuCommandBuffer trait - for recording rendering commands

use std::sync::Arc;

use crate::error::Result;
use crate::gpu::{
    Extent2d, GpuBuffer, GpuDescriptorSet, GpuFramebuffer, GpuPipeline, GpuRenderPass,
};

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-extent viewport with the default depth range
    pub fn from_extent(extent: Extent2d) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    /// Depth/stencil clear value
    DepthStencil { depth: f32, stencil: u32 },
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
}

/// State a secondary command buffer inherits so it can be recorded
/// independently of the primary buffer
pub struct CommandBufferInheritance {
    /// The render pass the commands will execute inside
    pub render_pass: Arc<dyn GpuRenderPass>,
    /// Subpass index within that render pass
    pub subpass: u32,
    /// Framebuffer the render pass instance is bound to
    pub framebuffer: Arc<dyn GpuFramebuffer>,
}

/// Command buffer for recording rendering commands
///
/// Primary-level buffers drive render-pass instances and execute secondary
/// buffers; secondary-level buffers record draw work for one subpass.
pub trait GpuCommandBuffer: Send {
    /// Begin recording commands
    fn begin(&mut self) -> Result<()>;

    /// End recording commands
    fn end(&mut self) -> Result<()>;

    /// Begin a render pass instance (primary buffers only)
    ///
    /// # Arguments
    ///
    /// * `render_pass` - The render pass to begin
    /// * `framebuffer` - The framebuffer containing the attachments
    /// * `clear_values` - Clear values, one per attachment
    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn GpuRenderPass>,
        framebuffer: &Arc<dyn GpuFramebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()>;

    /// Advance the render pass instance to its next subpass
    fn next_subpass(&mut self) -> Result<()>;

    /// End the current render pass instance
    fn end_render_pass(&mut self) -> Result<()>;

    /// Execute recorded secondary command buffers, in order, within the
    /// current subpass (primary buffers only). Ownership transfers to the
    /// backend, which recycles the buffers once GPU execution completes.
    fn execute_commands(&mut self, secondaries: Vec<Box<dyn GpuCommandBuffer>>) -> Result<()>;

    /// Set the viewport
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// Set the scissor rectangle
    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: &Arc<dyn GpuPipeline>) -> Result<()>;

    /// Bind a descriptor set at `set_index`
    ///
    /// # Arguments
    ///
    /// * `set_index` - Set slot (0 = per-frame uniforms, 1 = subpass inputs)
    /// * `set` - The descriptor set to bind
    /// * `dynamic_offsets` - Dynamic offsets for dynamic-uniform bindings
    fn bind_descriptor_set(
        &mut self,
        set_index: u32,
        set: &Arc<dyn GpuDescriptorSet>,
        dynamic_offsets: &[u32],
    ) -> Result<()>;

    /// Bind a vertex buffer
    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn GpuBuffer>, offset: u64) -> Result<()>;

    /// Bind an index buffer
    fn bind_index_buffer(
        &mut self,
        buffer: &Arc<dyn GpuBuffer>,
        offset: u64,
        index_type: IndexType,
    ) -> Result<()>;

    /// Draw vertices
    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    /// Draw indexed vertices
    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32)
        -> Result<()>;
}
