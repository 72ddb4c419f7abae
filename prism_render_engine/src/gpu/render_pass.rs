/// Render pass description types - how attachments are loaded, stored and
/// transitioned across subpasses

use crate::gpu::{SampleCount, TextureFormat};

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentLoadOp {
    /// Load existing content
    Load,
    /// Clear the content
    Clear,
    /// Don't care about existing content
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentStoreOp {
    /// Store the rendered content
    Store,
    /// Don't care about storing the content
    DontCare,
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    /// Undefined layout (initial state)
    Undefined,
    /// Layout for color attachment
    ColorAttachment,
    /// Layout for depth/stencil attachment
    DepthStencilAttachment,
    /// Layout for shader read-only access (input attachments)
    ShaderReadOnly,
    /// Layout for presenting to the window surface
    PresentSrc,
}

/// Descriptor for a single attachment in a render pass
#[derive(Debug, Clone)]
pub struct RenderPassAttachment {
    /// Pixel format
    pub format: TextureFormat,
    /// Per-pixel sample count
    pub samples: SampleCount,
    /// Load operation (what to do with existing content)
    pub load_op: AttachmentLoadOp,
    /// Store operation (what to do with rendered content)
    pub store_op: AttachmentStoreOp,
    /// Initial layout (how the attachment starts)
    pub initial_layout: ImageLayout,
    /// Final layout (how the attachment ends)
    pub final_layout: ImageLayout,
}

/// One subpass within a render pass
///
/// Indices refer into `RenderPassDesc::attachments`.
#[derive(Debug, Clone, Default)]
pub struct RenderPassSubpass {
    /// Attachments written as color outputs
    pub color_attachments: Vec<u32>,
    /// Attachments read as subpass inputs
    pub input_attachments: Vec<u32>,
    /// Depth/stencil attachment, if any
    pub depth_stencil_attachment: Option<u32>,
    /// Single-sample attachments the color outputs resolve into
    /// (parallel to `color_attachments`; empty when not multisampled)
    pub resolve_attachments: Vec<u32>,
    /// Attachments whose contents must survive this subpass untouched
    pub preserve_attachments: Vec<u32>,
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone)]
pub struct RenderPassDesc {
    /// All attachments, MSAA and resolve targets included
    pub attachments: Vec<RenderPassAttachment>,
    /// Ordered subpasses
    pub subpasses: Vec<RenderPassSubpass>,
}
