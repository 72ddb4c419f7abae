/// RenderTarget - owns the images, views and framebuffers a renderer draws into
///
/// Window-backed targets build one framebuffer per backbuffer image;
/// offscreen targets build a single framebuffer over owned images. At
/// sample counts above 1 the target additionally owns the multisampled
/// images, with color work resolving into the single-sample targets
/// (the backbuffer, for attachment 0 of a window target).

use std::sync::Arc;

use crate::error::Result;
use crate::gpu::{
    Extent2d, GpuCommandBuffer, GpuDevice, GpuFramebuffer, GpuImage, GpuImageView, GpuRenderPass,
    ImageDesc, ImageUsage, SampleCount,
};
use crate::render::{AttachmentKind, RenderLayout};
use crate::window::RenderWindow;

/// What a render target draws into
pub enum TargetBinding {
    /// The window's backbuffer images
    Window(Arc<dyn RenderWindow>),
    /// Offscreen images at a fixed extent
    Offscreen { extent: Extent2d },
}

/// The set of images/views/framebuffers for one renderer
pub struct RenderTarget {
    device: Arc<dyn GpuDevice>,
    layout: Arc<RenderLayout>,
    binding: TargetBinding,
    extent: Extent2d,
    samples: SampleCount,
    /// Owned images, kept alive for as long as the framebuffers use them
    images: Vec<Arc<dyn GpuImage>>,
    /// Per base attachment: the view input-attachment descriptors point at.
    /// None for a backbuffer attachment (never a valid input source).
    input_views: Vec<Option<Arc<dyn GpuImageView>>>,
    /// One per backbuffer image for window targets, exactly one offscreen
    framebuffers: Vec<Arc<dyn GpuFramebuffer>>,
}

impl RenderTarget {
    pub(crate) fn new(
        device: Arc<dyn GpuDevice>,
        layout: Arc<RenderLayout>,
        binding: TargetBinding,
        render_pass: &Arc<dyn GpuRenderPass>,
        samples: SampleCount,
    ) -> Result<Self> {
        let mut target = Self {
            device,
            layout,
            binding,
            extent: Extent2d::new(0, 0),
            samples,
            images: Vec::new(),
            input_views: Vec::new(),
            framebuffers: Vec::new(),
        };
        target.build(render_pass)?;
        Ok(target)
    }

    /// Tear down and recreate every image, view and framebuffer at the
    /// current size and the given sample count
    ///
    /// Must only be called once all in-flight GPU work has completed (after
    /// a device-idle wait); the old images drop here.
    pub(crate) fn rebuild(
        &mut self,
        render_pass: &Arc<dyn GpuRenderPass>,
        samples: SampleCount,
    ) -> Result<()> {
        self.samples = samples;
        self.framebuffers.clear();
        self.input_views.clear();
        self.images.clear();
        self.build(render_pass)
    }

    /// Submit a finished primary command buffer and, for window targets,
    /// present the completed image
    ///
    /// This is the hand-off from recorded to executing commands.
    pub(crate) fn swap(
        &self,
        commands: Box<dyn GpuCommandBuffer>,
        image_index: u32,
        frame_slot: usize,
    ) -> Result<()> {
        self.device.submit(commands, frame_slot)?;
        if let TargetBinding::Window(window) = &self.binding {
            window.present(image_index)?;
        }
        Ok(())
    }

    fn build(&mut self, render_pass: &Arc<dyn GpuRenderPass>) -> Result<()> {
        let multisampled = self.samples != SampleCount::X1;
        let (extent, framebuffer_count) = match &self.binding {
            TargetBinding::Window(window) => (window.size(), window.backbuffer_count()),
            TargetBinding::Offscreen { extent } => (*extent, 1),
        };
        self.extent = extent;

        // Per framebuffer, per attachment-slot views; slot order matches the
        // derived render-pass descriptor: base attachments, then resolve
        // attachments for every color attachment when multisampled.
        let mut slots: Vec<AttachmentSlot> = Vec::new();

        for (index, attachment) in self.layout.attachments().iter().enumerate() {
            let backbuffer_direct =
                self.is_window_backed() && index == 0 && !multisampled;
            if backbuffer_direct {
                slots.push(AttachmentSlot::Backbuffer);
                self.input_views.push(None);
                continue;
            }

            let mut usage = match attachment.kind {
                AttachmentKind::Color => ImageUsage::COLOR_ATTACHMENT,
                AttachmentKind::DepthStencil => ImageUsage::DEPTH_STENCIL_ATTACHMENT,
            };
            if self.layout.uses_as_input(index as u32) {
                usage |= ImageUsage::INPUT_ATTACHMENT;
            }
            if multisampled {
                usage |= ImageUsage::TRANSIENT;
            }
            let image = self.device.create_image(&ImageDesc {
                extent,
                format: attachment.format,
                samples: self.samples,
                usage,
            })?;
            let view = image.view();
            self.images.push(image);
            self.input_views.push(Some(view.clone()));
            slots.push(AttachmentSlot::Shared(view));
        }

        if multisampled {
            for (index, attachment) in self.layout.attachments().iter().enumerate() {
                if attachment.kind != AttachmentKind::Color {
                    continue;
                }
                if self.is_window_backed() && index == 0 {
                    slots.push(AttachmentSlot::Backbuffer);
                    continue;
                }
                let mut usage = ImageUsage::COLOR_ATTACHMENT;
                if attachment.preserved {
                    usage |= ImageUsage::SAMPLED;
                }
                let image = self.device.create_image(&ImageDesc {
                    extent,
                    format: attachment.format,
                    samples: SampleCount::X1,
                    usage,
                })?;
                let view = image.view();
                self.images.push(image);
                slots.push(AttachmentSlot::Shared(view));
            }
        }

        for framebuffer_index in 0..framebuffer_count {
            let views: Vec<Arc<dyn GpuImageView>> = slots
                .iter()
                .map(|slot| match slot {
                    AttachmentSlot::Shared(view) => view.clone(),
                    AttachmentSlot::Backbuffer => match &self.binding {
                        TargetBinding::Window(window) => window.backbuffer_view(framebuffer_index),
                        // Backbuffer slots only exist for window targets
                        TargetBinding::Offscreen { .. } => unreachable!(),
                    },
                })
                .collect();
            self.framebuffers
                .push(self.device.create_framebuffer(render_pass, &views, extent)?);
        }

        Ok(())
    }

    /// Framebuffer for backbuffer `index` (always index 0 offscreen)
    pub fn framebuffer(&self, index: u32) -> &Arc<dyn GpuFramebuffer> {
        &self.framebuffers[index as usize]
    }

    /// View of base attachment `attachment` for input-attachment descriptors
    pub fn input_view(&self, attachment: u32) -> Option<&Arc<dyn GpuImageView>> {
        self.input_views[attachment as usize].as_ref()
    }

    /// Current extent
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// Current sample count
    pub fn samples(&self) -> SampleCount {
        self.samples
    }

    /// Whether this target draws into a window surface
    pub fn is_window_backed(&self) -> bool {
        matches!(self.binding, TargetBinding::Window(_))
    }

    pub(crate) fn window(&self) -> Option<&Arc<dyn RenderWindow>> {
        match &self.binding {
            TargetBinding::Window(window) => Some(window),
            TargetBinding::Offscreen { .. } => None,
        }
    }
}

enum AttachmentSlot {
    /// Same view in every framebuffer (owned image)
    Shared(Arc<dyn GpuImageView>),
    /// Per-framebuffer backbuffer view
    Backbuffer,
}
