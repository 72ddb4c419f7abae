/// RenderLayout - immutable description of subpasses and attachment usage
///
/// A layout is validated once at construction and shared by reference from
/// then on. The render-pass descriptor handed to the device (including MSAA
/// resolve attachments) and the per-subpass input-attachment descriptor
/// requirements are both derived from it.

use crate::error::{Error, Result};
use crate::gpu::{
    AttachmentLoadOp, AttachmentStoreOp, ImageLayout, RenderPassAttachment, RenderPassDesc,
    RenderPassSubpass, SampleCount, TextureFormat,
};

/// Maximum input attachments a single subpass may declare
pub const MAX_INPUT_ATTACHMENTS: usize = 4;

/// What an attachment fundamentally is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Color attachment
    Color,
    /// Depth/stencil attachment
    DepthStencil,
}

/// One attachment in a render layout
#[derive(Debug, Clone)]
pub struct AttachmentDesc {
    /// Pixel format
    pub format: TextureFormat,
    /// Color or depth/stencil
    pub kind: AttachmentKind,
    /// Whether the contents survive the end of the render pass.
    /// Attachment 0 of a window-targeting layout must be preserved (it is
    /// what gets presented).
    pub preserved: bool,
    /// Whether the attachment may be rendered multisampled
    pub msaa_capable: bool,
}

/// Attachment usage of one subpass
///
/// All indices refer into the layout's attachment list.
#[derive(Debug, Clone, Default)]
pub struct SubpassDesc {
    /// Attachments written as color outputs
    pub color_attachments: Vec<u32>,
    /// Attachments read as subpass inputs (at most [`MAX_INPUT_ATTACHMENTS`])
    pub input_attachments: Vec<u32>,
    /// Depth/stencil attachment, if the subpass tests/writes depth
    pub depth_attachment: Option<u32>,
    /// Attachments carried through this subpass untouched
    pub preserve_attachments: Vec<u32>,
}

/// Immutable description of a renderer's subpasses and attachments
#[derive(Debug, Clone)]
pub struct RenderLayout {
    attachments: Vec<AttachmentDesc>,
    subpasses: Vec<SubpassDesc>,
}

impl RenderLayout {
    /// Validate and build a layout
    ///
    /// # Errors
    ///
    /// `InvalidOperation` for malformed descriptions (no subpasses, indices
    /// out of range, depth use of a color attachment); `Unsupported` when a
    /// subpass declares more than [`MAX_INPUT_ATTACHMENTS`] inputs.
    pub fn new(attachments: Vec<AttachmentDesc>, subpasses: Vec<SubpassDesc>) -> Result<Self> {
        if attachments.is_empty() {
            return Err(Error::InvalidOperation(
                "render layout needs at least one attachment".to_string(),
            ));
        }
        if subpasses.is_empty() {
            return Err(Error::InvalidOperation(
                "render layout needs at least one subpass".to_string(),
            ));
        }

        let count = attachments.len() as u32;
        for (index, subpass) in subpasses.iter().enumerate() {
            let all_refs = subpass
                .color_attachments
                .iter()
                .chain(subpass.input_attachments.iter())
                .chain(subpass.depth_attachment.iter())
                .chain(subpass.preserve_attachments.iter());
            for &attachment in all_refs {
                if attachment >= count {
                    return Err(Error::InvalidOperation(format!(
                        "subpass {} references attachment {} but layout has {}",
                        index, attachment, count
                    )));
                }
            }

            for &attachment in &subpass.color_attachments {
                if attachments[attachment as usize].kind != AttachmentKind::Color {
                    return Err(Error::InvalidOperation(format!(
                        "subpass {} uses depth/stencil attachment {} as a color output",
                        index, attachment
                    )));
                }
            }
            if let Some(depth) = subpass.depth_attachment {
                if attachments[depth as usize].kind != AttachmentKind::DepthStencil {
                    return Err(Error::InvalidOperation(format!(
                        "subpass {} uses color attachment {} as its depth attachment",
                        index, depth
                    )));
                }
            }
            if subpass.input_attachments.len() > MAX_INPUT_ATTACHMENTS {
                return Err(Error::Unsupported(format!(
                    "subpass {} declares {} input attachments (limit {})",
                    index,
                    subpass.input_attachments.len(),
                    MAX_INPUT_ATTACHMENTS
                )));
            }
        }

        Ok(Self { attachments, subpasses })
    }

    /// Number of subpasses
    pub fn subpass_count(&self) -> u32 {
        self.subpasses.len() as u32
    }

    /// Number of attachments
    pub fn attachment_count(&self) -> u32 {
        self.attachments.len() as u32
    }

    /// Attachment description by index
    pub fn attachment(&self, index: u32) -> &AttachmentDesc {
        &self.attachments[index as usize]
    }

    /// Subpass description by index
    pub fn subpass(&self, index: u32) -> &SubpassDesc {
        &self.subpasses[index as usize]
    }

    /// All attachments
    pub fn attachments(&self) -> &[AttachmentDesc] {
        &self.attachments
    }

    /// All subpasses
    pub fn subpasses(&self) -> &[SubpassDesc] {
        &self.subpasses
    }

    /// Whether every attachment actually rendered to (color or depth use)
    /// can be multisampled
    pub fn msaa_capable(&self) -> bool {
        self.subpasses.iter().all(|subpass| {
            subpass
                .color_attachments
                .iter()
                .chain(subpass.depth_attachment.iter())
                .all(|&attachment| self.attachments[attachment as usize].msaa_capable)
        })
    }

    /// Whether any subpass reads `attachment` as an input attachment
    pub fn uses_as_input(&self, attachment: u32) -> bool {
        self.subpasses
            .iter()
            .any(|subpass| subpass.input_attachments.contains(&attachment))
    }

    /// Check the layout against a window surface
    ///
    /// Attachment 0 of a window-targeting layout must be a preserved color
    /// attachment matching the surface format.
    pub fn check_window_compatible(&self, surface_format: TextureFormat) -> Result<()> {
        let first = &self.attachments[0];
        if first.kind != AttachmentKind::Color {
            return Err(Error::Unsupported(
                "attachment 0 of a window layout must be a color attachment".to_string(),
            ));
        }
        if first.format != surface_format {
            return Err(Error::Unsupported(format!(
                "attachment 0 format {:?} does not match window surface format {:?}",
                first.format, surface_format
            )));
        }
        if !first.preserved {
            return Err(Error::Unsupported(
                "attachment 0 of a window layout must be preserved".to_string(),
            ));
        }
        Ok(())
    }

    /// Derive the device render-pass descriptor for the given sample count
    ///
    /// At sample counts above 1, every attachment is rendered multisampled
    /// and each color attachment gains a single-sample resolve attachment
    /// appended after the base attachments. `present_target` marks
    /// attachment 0 (or its resolve target) for presentation.
    pub fn render_pass_desc(&self, samples: SampleCount, present_target: bool) -> RenderPassDesc {
        let multisampled = samples != SampleCount::X1;
        let base_count = self.attachments.len() as u32;

        let mut attachments: Vec<RenderPassAttachment> = Vec::new();
        for (index, attachment) in self.attachments.iter().enumerate() {
            let is_present = present_target && index == 0 && !multisampled;
            let store_op = match (attachment.kind, multisampled, attachment.preserved) {
                // Multisampled color data lives on in the resolve target
                (AttachmentKind::Color, true, _) => AttachmentStoreOp::DontCare,
                (_, _, true) => AttachmentStoreOp::Store,
                (_, _, false) => AttachmentStoreOp::DontCare,
            };
            let final_layout = match attachment.kind {
                AttachmentKind::DepthStencil => ImageLayout::DepthStencilAttachment,
                AttachmentKind::Color if is_present => ImageLayout::PresentSrc,
                AttachmentKind::Color if self.uses_as_input(index as u32) => {
                    ImageLayout::ShaderReadOnly
                }
                AttachmentKind::Color => ImageLayout::ColorAttachment,
            };
            attachments.push(RenderPassAttachment {
                format: attachment.format,
                samples,
                load_op: AttachmentLoadOp::Clear,
                store_op,
                initial_layout: ImageLayout::Undefined,
                final_layout,
            });
        }

        // Resolve targets, one per color attachment, appended after the base
        // attachments. resolve_index[i] maps base attachment i to its
        // resolve attachment.
        let mut resolve_index = vec![None; self.attachments.len()];
        if multisampled {
            for (index, attachment) in self.attachments.iter().enumerate() {
                if attachment.kind != AttachmentKind::Color {
                    continue;
                }
                resolve_index[index] = Some(base_count + resolve_count(&resolve_index, index));
                attachments.push(RenderPassAttachment {
                    format: attachment.format,
                    samples: SampleCount::X1,
                    load_op: AttachmentLoadOp::DontCare,
                    store_op: if attachment.preserved {
                        AttachmentStoreOp::Store
                    } else {
                        AttachmentStoreOp::DontCare
                    },
                    initial_layout: ImageLayout::Undefined,
                    final_layout: if present_target && index == 0 {
                        ImageLayout::PresentSrc
                    } else {
                        ImageLayout::ColorAttachment
                    },
                });
            }
        }

        let subpasses = self
            .subpasses
            .iter()
            .map(|subpass| RenderPassSubpass {
                color_attachments: subpass.color_attachments.clone(),
                input_attachments: subpass.input_attachments.clone(),
                depth_stencil_attachment: subpass.depth_attachment,
                resolve_attachments: if multisampled {
                    subpass
                        .color_attachments
                        .iter()
                        .filter_map(|&color| resolve_index[color as usize])
                        .collect()
                } else {
                    Vec::new()
                },
                preserve_attachments: subpass.preserve_attachments.clone(),
            })
            .collect();

        RenderPassDesc { attachments, subpasses }
    }
}

/// Number of resolve slots assigned to base attachments before `index`
fn resolve_count(resolve_index: &[Option<u32>], index: usize) -> u32 {
    resolve_index[..index].iter().filter(|slot| slot.is_some()).count() as u32
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
