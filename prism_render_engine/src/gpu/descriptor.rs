/// Descriptor set contract
///
/// The render core maintains two descriptor sets per renderer: a dynamic
/// uniform-buffer binding shared across subpasses and, per subpass that
/// declares input attachments, an input-attachment set. Layout variants are
/// a closed enum so pool sizing and layout lookup stay table-driven in the
/// backend instead of branching on reflection data.

use std::sync::Arc;

use crate::gpu::{GpuBuffer, GpuImageView};

/// Descriptor-set layout variants the render core allocates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorSetKind {
    /// One dynamic uniform-buffer binding at binding 0
    DynamicUniform,
    /// `count` input-attachment bindings at bindings 0..count
    InputAttachments { count: u32 },
}

/// A single descriptor write
#[derive(Clone)]
pub enum DescriptorWrite {
    /// Point a dynamic uniform binding at a buffer region.
    /// `range` is the per-draw visible size; the dynamic offset is supplied
    /// at bind time.
    DynamicUniformBuffer {
        binding: u32,
        buffer: Arc<dyn GpuBuffer>,
        range: u64,
    },
    /// Point an input-attachment binding at an image view
    InputAttachment {
        binding: u32,
        view: Arc<dyn GpuImageView>,
    },
}

/// An allocated descriptor set
///
/// Sets are allocated once and re-written in place when the resources they
/// reference are rebuilt; a stale write referencing a destroyed view is a
/// correctness bug, not just a leak.
pub trait GpuDescriptorSet: Send + Sync {
    /// The layout kind this set was allocated with
    fn kind(&self) -> DescriptorSetKind;
}
