/// Renderer - render-pass orchestration
///
/// The long-lived orchestrator object. Owns the render layout, render
/// target, render-pass handle, uniform push buffer and descriptor sets, and
/// drives the per-frame recording state machine:
///
/// `Idle -> Recording(subpass 0) -> ... -> Recording(subpass N-1) -> Idle`
///
/// The primary recording sequence (`begin` / `next_subpass` / `submit` /
/// `end`) must be driven from one logical thread at a time; only
/// `CommandRecorder`s may run in parallel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::error::{Error, Result};
use crate::gpu::{
    ClearValue, DescriptorSetKind, DescriptorWrite, Extent2d, GpuCommandBuffer, GpuDescriptorSet,
    GpuDevice, GpuFramebuffer, GpuRenderPass, PipelineDesc, SampleCount,
};
use crate::render::pipeline::{self, Pipeline, PipelineSet};
use crate::render::{CommandList, RenderLayout, RenderTarget, TargetBinding, UniformPushBuffer};
use crate::window::RenderWindow;
use crate::{engine_bail, engine_debug, engine_info};

/// Process-unique renderer identity, carried by `CommandList`s so
/// provenance checks work without holding borrows across threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RendererId(u64);

static NEXT_RENDERER_ID: AtomicU64 = AtomicU64::new(1);

/// Logical frame tick shared between the application loop and its renderers
///
/// The loop advances the clock once per frame; a window-backed renderer
/// refuses to present twice within one tick.
#[derive(Clone)]
pub struct FrameClock(Arc<AtomicU64>);

impl FrameClock {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(0)))
    }

    /// Advance to the next logical frame tick
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Current tick
    pub fn now(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Construction parameters for a renderer
pub struct RendererDesc {
    pub layout: RenderLayout,
    /// Initial MSAA sample count
    pub samples: SampleCount,
    /// Per-frame uniform push buffer capacity in bytes
    pub uniform_capacity: u64,
}

/// Snapshot handed to `CommandRecorder::begin` so secondary recording can
/// inherit the active render pass instance
pub(crate) struct RecordingContext {
    pub render_pass: Arc<dyn GpuRenderPass>,
    pub framebuffer: Arc<dyn GpuFramebuffer>,
    pub renderer: RendererId,
    pub frame: u64,
    pub frame_counter: Arc<AtomicU64>,
}

enum RecordingState {
    Idle,
    Recording {
        subpass: u32,
        commands: Box<dyn GpuCommandBuffer>,
        image_index: u32,
    },
}

/// The render-pass orchestrator
pub struct Renderer {
    id: RendererId,
    device: Arc<dyn GpuDevice>,
    layout: Arc<RenderLayout>,
    clock: FrameClock,
    target: RenderTarget,
    render_pass: Arc<dyn GpuRenderPass>,
    samples: SampleCount,
    clear_values: Vec<ClearValue>,
    push_buffer: UniformPushBuffer,
    uniform_set: Arc<dyn GpuDescriptorSet>,
    /// Input-attachment set per subpass that declares inputs
    input_sets: FxHashMap<u32, Arc<dyn GpuDescriptorSet>>,
    pipelines: Arc<PipelineSet>,
    state: RecordingState,
    /// Recording generation; bumped at every `begin`. Recorders capture it
    /// to detect stale recordings.
    frame: Arc<AtomicU64>,
    /// Clock tick of the last completed present (window targets only)
    last_presented_tick: Option<u64>,
}

impl Renderer {
    /// Create a renderer drawing into a window surface
    ///
    /// At most one renderer may target a window at a time. Attachment 0 of
    /// the layout must be a preserved color attachment matching the surface
    /// format, and must not be read back as an input attachment.
    pub fn new_windowed(
        device: Arc<dyn GpuDevice>,
        window: Arc<dyn RenderWindow>,
        clock: FrameClock,
        desc: RendererDesc,
    ) -> Result<Self> {
        if window.has_renderer() {
            return Err(Error::InvalidOperation(
                "window already has a renderer attached".to_string(),
            ));
        }
        desc.layout.check_window_compatible(window.surface_format())?;
        if desc.layout.uses_as_input(0) {
            return Err(Error::Unsupported(
                "attachment 0 of a window layout cannot be an input attachment".to_string(),
            ));
        }

        let renderer = Self::build(
            device,
            TargetBinding::Window(window.clone()),
            clock,
            desc,
            true,
        )?;
        window.set_has_renderer(true);
        Ok(renderer)
    }

    /// Create a renderer drawing into offscreen images at `extent`
    pub fn new_offscreen(
        device: Arc<dyn GpuDevice>,
        extent: Extent2d,
        clock: FrameClock,
        desc: RendererDesc,
    ) -> Result<Self> {
        Self::build(device, TargetBinding::Offscreen { extent }, clock, desc, false)
    }

    fn build(
        device: Arc<dyn GpuDevice>,
        binding: TargetBinding,
        clock: FrameClock,
        desc: RendererDesc,
        present_target: bool,
    ) -> Result<Self> {
        Self::check_samples(&device, &desc.layout, desc.samples)?;

        let layout = Arc::new(desc.layout);
        let render_pass =
            device.create_render_pass(&layout.render_pass_desc(desc.samples, present_target))?;
        let target = RenderTarget::new(
            device.clone(),
            layout.clone(),
            binding,
            &render_pass,
            desc.samples,
        )?;
        let push_buffer = UniformPushBuffer::new(device.clone(), desc.uniform_capacity)?;

        let uniform_set = device.allocate_descriptor_set(DescriptorSetKind::DynamicUniform)?;
        let mut input_sets = FxHashMap::default();
        for subpass in 0..layout.subpass_count() {
            let inputs = layout.subpass(subpass).input_attachments.len() as u32;
            if inputs > 0 {
                let set = device
                    .allocate_descriptor_set(DescriptorSetKind::InputAttachments { count: inputs })?;
                input_sets.insert(subpass, set);
            }
        }

        let clear_values = layout
            .attachments()
            .iter()
            .map(|attachment| match attachment.kind {
                crate::render::AttachmentKind::Color => ClearValue::Color([0.0, 0.0, 0.0, 1.0]),
                crate::render::AttachmentKind::DepthStencil => {
                    ClearValue::DepthStencil { depth: 1.0, stencil: 0 }
                }
            })
            .collect();

        let mut renderer = Self {
            id: RendererId(NEXT_RENDERER_ID.fetch_add(1, Ordering::Relaxed)),
            device,
            layout,
            clock,
            target,
            render_pass,
            samples: desc.samples,
            clear_values,
            push_buffer,
            uniform_set,
            input_sets,
            pipelines: Arc::new(Mutex::new(SlotMap::with_key())),
            state: RecordingState::Idle,
            frame: Arc::new(AtomicU64::new(0)),
            last_presented_tick: None,
        };
        renderer.write_descriptor_sets()?;

        engine_info!(
            "prism3d::Renderer",
            "created renderer {:?}: {} subpasses, {}x{}, {} samples",
            renderer.id,
            renderer.layout.subpass_count(),
            renderer.target.extent().width,
            renderer.target.extent().height,
            renderer.samples.as_u32()
        );
        Ok(renderer)
    }

    fn check_samples(
        device: &Arc<dyn GpuDevice>,
        layout: &RenderLayout,
        samples: SampleCount,
    ) -> Result<()> {
        if samples != SampleCount::X1 && !layout.msaa_capable() {
            return Err(Error::Unsupported(
                "layout has attachments that cannot be multisampled".to_string(),
            ));
        }
        if !device.supports_sample_count(samples) {
            return Err(Error::Unsupported(format!(
                "device does not support {} samples",
                samples.as_u32()
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> RendererId {
        self.id
    }

    pub fn layout(&self) -> &RenderLayout {
        &self.layout
    }

    pub fn subpass_count(&self) -> u32 {
        self.layout.subpass_count()
    }

    /// Whether a frame is currently being recorded
    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecordingState::Recording { .. })
    }

    /// Subpass currently being recorded, if any
    pub fn current_subpass(&self) -> Option<u32> {
        match &self.state {
            RecordingState::Recording { subpass, .. } => Some(*subpass),
            RecordingState::Idle => None,
        }
    }

    pub fn samples(&self) -> SampleCount {
        self.samples
    }

    pub fn size(&self) -> Extent2d {
        self.target.extent()
    }

    pub fn is_window_backed(&self) -> bool {
        self.target.is_window_backed()
    }

    /// The render target this renderer draws into
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Per-frame uniform staging area
    pub fn uniforms(&mut self) -> &mut UniformPushBuffer {
        &mut self.push_buffer
    }

    /// The dynamic uniform-buffer descriptor set (set 0), shared across
    /// subpasses
    pub fn uniform_descriptor_set(&self) -> &Arc<dyn GpuDescriptorSet> {
        &self.uniform_set
    }

    /// The input-attachment descriptor set for `subpass`, if that subpass
    /// declares input attachments
    pub fn input_descriptor_set(&self, subpass: u32) -> Option<&Arc<dyn GpuDescriptorSet>> {
        self.input_sets.get(&subpass)
    }

    /// Replace the per-attachment clear values used at `begin`
    pub fn set_clear_values(&mut self, values: Vec<ClearValue>) -> Result<()> {
        if self.is_recording() {
            engine_bail!("prism3d::Renderer", "set_clear_values called while recording");
        }
        if values.len() != self.layout.attachment_count() as usize {
            engine_bail!(
                "prism3d::Renderer",
                "set_clear_values: {} values for {} attachments",
                values.len(),
                self.layout.attachment_count()
            );
        }
        self.clear_values = values;
        Ok(())
    }

    // ========================================================================
    // Recording state machine
    // ========================================================================

    /// Open a primary command buffer and begin the render pass instance
    ///
    /// Valid only from idle. For window targets a second `begin` within the
    /// frame tick of the last completed `end` fails: one present per tick.
    /// Advances the uniform push buffer to the next frame region (waiting
    /// on that region's fence) and resets the subpass counter to 0.
    pub fn begin(&mut self) -> Result<()> {
        if self.is_recording() {
            engine_bail!("prism3d::Renderer", "begin: already recording");
        }
        if self.target.is_window_backed() && self.last_presented_tick == Some(self.clock.now()) {
            engine_bail!(
                "prism3d::Renderer",
                "begin: frame already presented this tick (tick {})",
                self.clock.now()
            );
        }

        self.frame.fetch_add(1, Ordering::AcqRel);
        self.push_buffer.next_frame()?;

        let image_index = match self.target.window() {
            Some(window) => window.acquire_next_image()?,
            None => 0,
        };

        let mut commands = self.device.allocate_primary_command_buffer()?;
        commands.begin()?;
        commands.begin_render_pass(
            &self.render_pass,
            self.target.framebuffer(image_index),
            &self.clear_values,
        )?;

        self.state = RecordingState::Recording { subpass: 0, commands, image_index };
        Ok(())
    }

    /// Advance to the next subpass
    ///
    /// Valid only while recording and not already on the last subpass.
    pub fn next_subpass(&mut self) -> Result<()> {
        let last = self.layout.subpass_count() - 1;
        match &mut self.state {
            RecordingState::Idle => {
                engine_bail!("prism3d::Renderer", "next_subpass: not recording");
            }
            RecordingState::Recording { subpass, .. } if *subpass >= last => {
                engine_bail!(
                    "prism3d::Renderer",
                    "next_subpass: already on last subpass {}",
                    last
                );
            }
            RecordingState::Recording { subpass, commands, .. } => {
                commands.next_subpass()?;
                *subpass += 1;
                Ok(())
            }
        }
    }

    /// Execute recorded command lists within the current subpass
    ///
    /// All-or-nothing: every list is validated before any is executed, so a
    /// failure leaves every list untouched and still valid. On success the
    /// lists execute in the order given and are all invalidated.
    pub fn submit(&mut self, lists: &mut [CommandList]) -> Result<()> {
        let current_frame = self.frame.load(Ordering::Acquire);
        let (current_subpass, commands) = match &mut self.state {
            RecordingState::Recording { subpass, commands, .. } => (*subpass, commands),
            RecordingState::Idle => {
                engine_bail!("prism3d::Renderer", "submit: not recording");
            }
        };

        // Validate everything before touching anything
        for list in lists.iter() {
            if !list.is_valid() {
                engine_bail!(
                    "prism3d::Renderer",
                    "submit: command list already submitted or discarded"
                );
            }
            if list.renderer() != self.id {
                engine_bail!(
                    "prism3d::Renderer",
                    "submit: command list was recorded for a different renderer"
                );
            }
            if list.frame() != current_frame {
                engine_bail!(
                    "prism3d::Renderer",
                    "submit: command list was recorded for an earlier frame"
                );
            }
            if list.subpass() != current_subpass {
                engine_bail!(
                    "prism3d::Renderer",
                    "submit: command list targets subpass {} but renderer is at {}",
                    list.subpass(),
                    current_subpass
                );
            }
        }

        let buffers: Vec<Box<dyn GpuCommandBuffer>> = lists
            .iter_mut()
            .filter_map(CommandList::take_buffer)
            .collect();
        commands.execute_commands(buffers)?;
        Ok(())
    }

    /// Submit a single command list
    pub fn submit_one(&mut self, list: &mut CommandList) -> Result<()> {
        self.submit(std::slice::from_mut(list))
    }

    /// Close the render pass and hand the frame to the GPU
    ///
    /// Valid only on the last subpass; every subpass must be visited
    /// exactly once, in order, before ending. The render target performs
    /// the queue submission and, for window targets, the surface swap.
    pub fn end(&mut self) -> Result<()> {
        let last = self.layout.subpass_count() - 1;
        match &self.state {
            RecordingState::Idle => {
                engine_bail!("prism3d::Renderer", "end: not recording");
            }
            RecordingState::Recording { subpass, .. } if *subpass != last => {
                engine_bail!(
                    "prism3d::Renderer",
                    "end: on subpass {} but layout has {} subpasses",
                    subpass,
                    self.layout.subpass_count()
                );
            }
            RecordingState::Recording { .. } => {}
        }

        let RecordingState::Recording { mut commands, image_index, .. } =
            std::mem::replace(&mut self.state, RecordingState::Idle)
        else {
            unreachable!()
        };

        commands.end_render_pass()?;
        commands.end()?;
        self.target.swap(commands, image_index, self.push_buffer.frame_slot())?;

        if self.target.is_window_backed() {
            self.last_presented_tick = Some(self.clock.now());
        }
        Ok(())
    }

    pub(crate) fn recording_context(&self) -> Result<RecordingContext> {
        match &self.state {
            RecordingState::Recording { image_index, .. } => Ok(RecordingContext {
                render_pass: self.render_pass.clone(),
                framebuffer: self.target.framebuffer(*image_index).clone(),
                renderer: self.id,
                frame: self.frame.load(Ordering::Acquire),
                frame_counter: self.frame.clone(),
            }),
            RecordingState::Idle => Err(Error::InvalidOperation(
                "renderer is not recording a frame".to_string(),
            )),
        }
    }

    // ========================================================================
    // Reconfiguration
    // ========================================================================

    /// Resize an offscreen renderer
    ///
    /// Window-backed renderers derive their size from the window and refuse
    /// this call. Offscreen resizing beyond the unchanged-size no-op is an
    /// explicit non-goal for now.
    pub fn set_size(&mut self, size: Extent2d) -> Result<()> {
        if self.is_recording() {
            engine_bail!("prism3d::Renderer", "set_size called while recording");
        }
        if self.target.is_window_backed() {
            engine_bail!(
                "prism3d::Renderer",
                "set_size: window-backed renderer size derives from the window"
            );
        }
        if size == self.target.extent() {
            return Ok(());
        }
        Err(Error::Unsupported(
            "offscreen renderer resizing is not implemented".to_string(),
        ))
    }

    /// Change the MSAA sample count
    ///
    /// A rare, heavyweight reconfiguration: blocks until all in-flight GPU
    /// work completes, recreates the render pass and render target, rebuilds
    /// every tracked pipeline and rewrites the descriptor sets. Never call
    /// per-frame.
    pub fn set_msaa(&mut self, samples: SampleCount) -> Result<()> {
        if self.is_recording() {
            engine_bail!("prism3d::Renderer", "set_msaa called while recording");
        }
        if samples == self.samples {
            return Ok(());
        }
        Self::check_samples(&self.device, &self.layout, samples)?;

        self.device.wait_idle()?;

        let render_pass = self
            .device
            .create_render_pass(&self.layout.render_pass_desc(samples, self.is_window_backed()))?;
        self.target.rebuild(&render_pass, samples)?;
        pipeline::rebuild_all(&self.pipelines, &self.device, &render_pass)?;
        self.render_pass = render_pass;
        self.samples = samples;
        self.write_descriptor_sets()?;

        engine_info!(
            "prism3d::Renderer",
            "renderer {:?} reconfigured to {} samples",
            self.id,
            samples.as_u32()
        );
        Ok(())
    }

    /// Swapchain-resize notification from the windowing collaborator
    ///
    /// The windowing layer has already waited for device idle and recreated
    /// its backbuffers; rebuild the render target at the new size and
    /// rewrite the descriptor sets. The render pass is untouched since the
    /// sample count did not change.
    pub fn notify_resize(&mut self) -> Result<()> {
        if self.is_recording() {
            engine_bail!("prism3d::Renderer", "notify_resize called while recording");
        }
        if !self.target.is_window_backed() {
            engine_bail!(
                "prism3d::Renderer",
                "notify_resize: renderer has no window to resize with"
            );
        }

        let render_pass = self.render_pass.clone();
        self.target.rebuild(&render_pass, self.samples)?;
        self.write_descriptor_sets()?;

        engine_debug!(
            "prism3d::Renderer",
            "renderer {:?} rebuilt target at {}x{}",
            self.id,
            self.target.extent().width,
            self.target.extent().height
        );
        Ok(())
    }

    // ========================================================================
    // Pipelines
    // ========================================================================

    /// Create a pipeline bound to this renderer's current render pass
    ///
    /// The pipeline is tracked and rebuilt automatically when the render
    /// pass changes; dropping it removes it from the tracked set.
    pub fn create_pipeline(&self, desc: PipelineDesc) -> Result<Pipeline> {
        if desc.subpass >= self.layout.subpass_count() {
            engine_bail!(
                "prism3d::Renderer",
                "create_pipeline: subpass {} out of range (layout has {})",
                desc.subpass,
                self.layout.subpass_count()
            );
        }
        Pipeline::create(&self.device, &self.pipelines, &self.render_pass, desc)
    }

    /// Number of pipelines currently tracked
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.lock().expect("pipeline set lock poisoned").len()
    }

    // ========================================================================
    // Descriptor maintenance
    // ========================================================================

    /// (Re-)write the uniform and input-attachment descriptor sets against
    /// the current buffer and render-target views. Called at construction
    /// and after every target rebuild; sets are rewritten in place, never
    /// left pointing at destroyed views.
    fn write_descriptor_sets(&mut self) -> Result<()> {
        self.device.update_descriptor_set(
            &self.uniform_set,
            &[DescriptorWrite::DynamicUniformBuffer {
                binding: 0,
                buffer: self.push_buffer.buffer().clone(),
                range: self.push_buffer.frame_capacity(),
            }],
        )?;

        for (&subpass, set) in &self.input_sets {
            let inputs = &self.layout.subpass(subpass).input_attachments;
            let mut writes = Vec::with_capacity(inputs.len());
            for (binding, &attachment) in inputs.iter().enumerate() {
                let view = self.target.input_view(attachment).ok_or_else(|| {
                    Error::InvalidOperation(format!(
                        "attachment {} has no view usable as an input attachment",
                        attachment
                    ))
                })?;
                writes.push(DescriptorWrite::InputAttachment {
                    binding: binding as u32,
                    view: view.clone(),
                });
            }
            self.device.update_descriptor_set(set, &writes)?;
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Some(window) = self.target.window() {
            window.set_has_renderer(false);
        }
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
