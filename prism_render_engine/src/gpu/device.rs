/// GpuDevice trait - main device interface for creating resources and submitting commands

use std::sync::Arc;

use bitflags::bitflags;

use crate::error::Result;
use crate::gpu::{
    CommandBufferInheritance, DescriptorSetKind, DescriptorWrite, GpuCommandBuffer,
    GpuDescriptorSet, RenderPassDesc,
};

/// 2D extent in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Pixel formats supported by the render core
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    R8G8B8A8_UNORM,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    /// Whether this format is a depth/stencil format
    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, TextureFormat::D32_SFLOAT | TextureFormat::D24_UNORM_S8_UINT)
    }
}

/// Multi-sample count for MSAA rendering
///
/// A closed enum rather than a raw integer so every consumer dispatches over
/// the full variant set at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SampleCount {
    X1,
    X2,
    X4,
    X8,
}

impl SampleCount {
    /// Raw per-pixel sample count
    pub fn as_u32(&self) -> u32 {
        match self {
            SampleCount::X1 => 1,
            SampleCount::X2 => 2,
            SampleCount::X4 => 4,
            SampleCount::X8 => 8,
        }
    }

    /// Parse a raw sample count
    pub fn from_u32(samples: u32) -> Option<Self> {
        match samples {
            1 => Some(SampleCount::X1),
            2 => Some(SampleCount::X2),
            4 => Some(SampleCount::X4),
            8 => Some(SampleCount::X8),
            _ => None,
        }
    }
}

bitflags! {
    /// How an image will be used by the render core
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ImageUsage: u32 {
        const COLOR_ATTACHMENT = 0x01;
        const DEPTH_STENCIL_ATTACHMENT = 0x02;
        const INPUT_ATTACHMENT = 0x04;
        const SAMPLED = 0x08;
        /// Lazily allocated; contents never leave tile memory (MSAA scratch)
        const TRANSIENT = 0x10;
    }
}

/// Descriptor for creating a GPU image (plus its default view)
#[derive(Debug, Clone)]
pub struct ImageDesc {
    pub extent: Extent2d,
    pub format: TextureFormat,
    pub samples: SampleCount,
    pub usage: ImageUsage,
}

/// Device limits the render core cares about
#[derive(Debug, Clone, Copy)]
pub struct DeviceLimits {
    /// Minimum alignment for dynamic uniform buffer offsets, in bytes
    pub min_uniform_offset_alignment: u64,
    /// Highest sample count any attachment format supports
    pub max_sample_count: SampleCount,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

/// Descriptor for creating a graphics pipeline
///
/// Shader modules arrive as opaque compiled artifacts; reflection and
/// compilation are external collaborators.
#[derive(Clone)]
pub struct PipelineDesc {
    /// Debug label carried through logs
    pub label: String,
    /// Subpass of the owning renderer this pipeline draws in
    pub subpass: u32,
    pub vertex_shader: Arc<dyn GpuShaderModule>,
    pub fragment_shader: Option<Arc<dyn GpuShaderModule>>,
    pub topology: PrimitiveTopology,
}

// ============================================================================
// Resource handle traits
// ============================================================================

/// A compiled render-pass object
pub trait GpuRenderPass: Send + Sync {}

/// A framebuffer binding attachment views to a render pass
pub trait GpuFramebuffer: Send + Sync {
    fn extent(&self) -> Extent2d;
}

/// A GPU image together with its allocation
pub trait GpuImage: Send + Sync {
    fn desc(&self) -> &ImageDesc;

    /// Default full-image view
    fn view(&self) -> Arc<dyn GpuImageView>;
}

/// A view over a GPU image, usable as a framebuffer attachment or
/// input-attachment descriptor
pub trait GpuImageView: Send + Sync {}

/// A host-visible GPU buffer
pub trait GpuBuffer: Send + Sync {
    fn size(&self) -> u64;

    /// Copy `data` into the buffer at `offset`
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;
}

/// An opaque compiled shader module
pub trait GpuShaderModule: Send + Sync {}

/// A compiled graphics pipeline object
pub trait GpuPipeline: Send + Sync {}

// ============================================================================
// GpuDevice trait
// ============================================================================

/// Main GPU device trait
///
/// The render core's only window into the graphics API. Implemented by
/// backend crates (Vulkan, ...) and by `gpu::mock::MockDevice` for tests.
pub trait GpuDevice: Send + Sync {
    /// Device limits relevant to the render core
    fn limits(&self) -> DeviceLimits;

    /// Whether the device can render attachments at `samples`
    fn supports_sample_count(&self, samples: SampleCount) -> bool;

    /// Number of frames the CPU may record ahead of GPU execution
    fn frames_in_flight(&self) -> usize;

    /// Create a render pass
    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn GpuRenderPass>>;

    /// Create an image (and its default view)
    fn create_image(&self, desc: &ImageDesc) -> Result<Arc<dyn GpuImage>>;

    /// Create a framebuffer binding `attachments` to `render_pass`
    ///
    /// Attachment order must match the render-pass descriptor order.
    fn create_framebuffer(
        &self,
        render_pass: &Arc<dyn GpuRenderPass>,
        attachments: &[Arc<dyn GpuImageView>],
        extent: Extent2d,
    ) -> Result<Arc<dyn GpuFramebuffer>>;

    /// Create a host-visible uniform buffer of `size` bytes
    fn create_uniform_buffer(&self, size: u64) -> Result<Arc<dyn GpuBuffer>>;

    /// Wrap opaque shader bytecode into a module handle
    fn create_shader_module(&self, bytecode: &[u8]) -> Result<Arc<dyn GpuShaderModule>>;

    /// Create a graphics pipeline against `render_pass` at `desc.subpass`
    fn create_pipeline(
        &self,
        desc: &PipelineDesc,
        render_pass: &Arc<dyn GpuRenderPass>,
    ) -> Result<Arc<dyn GpuPipeline>>;

    /// Allocate a descriptor set of the given layout kind from the
    /// device-internal pool
    fn allocate_descriptor_set(&self, kind: DescriptorSetKind) -> Result<Arc<dyn GpuDescriptorSet>>;

    /// Re-point the bindings of an existing descriptor set
    fn update_descriptor_set(
        &self,
        set: &Arc<dyn GpuDescriptorSet>,
        writes: &[DescriptorWrite],
    ) -> Result<()>;

    /// Allocate a transient primary-level command buffer
    fn allocate_primary_command_buffer(&self) -> Result<Box<dyn GpuCommandBuffer>>;

    /// Allocate a transient secondary-level command buffer whose recording
    /// inherits the given render pass, subpass and framebuffer
    fn allocate_secondary_command_buffer(
        &self,
        inheritance: &CommandBufferInheritance,
    ) -> Result<Box<dyn GpuCommandBuffer>>;

    /// Submit a finished primary command buffer to the graphics queue,
    /// signalling the fence of `frame_slot` on completion
    fn submit(&self, commands: Box<dyn GpuCommandBuffer>, frame_slot: usize) -> Result<()>;

    /// Block until every submission tagged with `frame_slot` has completed
    fn wait_frame_fence(&self, frame_slot: usize) -> Result<()>;

    /// Block until all GPU work in flight completes. Expensive; used only by
    /// rare reconfiguration paths (MSAA change).
    fn wait_idle(&self) -> Result<()>;
}
