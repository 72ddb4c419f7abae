/// Mock GPU device and window for tests (no GPU required)
///
/// Every trait in the device and windowing contracts has a mock
/// implementation here. The device records each call as a string so tests
/// can assert on ordering, and the mock buffer keeps its bytes so tests can
/// check staging writes. Public (not `#[cfg(test)]`) so the integration
/// tests in `tests/` can drive the whole renderer without a backend.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::gpu::{
    ClearValue, CommandBufferInheritance, DescriptorSetKind, DescriptorWrite, DeviceLimits,
    Extent2d, GpuBuffer, GpuCommandBuffer, GpuDescriptorSet, GpuDevice, GpuFramebuffer, GpuImage,
    GpuImageView, GpuPipeline, GpuRenderPass, GpuShaderModule, ImageDesc, IndexType, PipelineDesc,
    Rect2D, RenderPassDesc, SampleCount, TextureFormat, Viewport,
};
use crate::window::RenderWindow;

// ============================================================================
// Mock resources
// ============================================================================

#[derive(Debug)]
pub struct MockImageView;

impl GpuImageView for MockImageView {}

pub struct MockImage {
    desc: ImageDesc,
    view: Arc<MockImageView>,
}

impl GpuImage for MockImage {
    fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    fn view(&self) -> Arc<dyn GpuImageView> {
        self.view.clone()
    }
}

pub struct MockRenderPass {
    pub attachment_count: usize,
    pub subpass_count: usize,
}

impl GpuRenderPass for MockRenderPass {}

pub struct MockFramebuffer {
    extent: Extent2d,
    pub attachment_count: usize,
}

impl GpuFramebuffer for MockFramebuffer {
    fn extent(&self) -> Extent2d {
        self.extent
    }
}

/// Mock buffer keeping its bytes so tests can inspect staged data
pub struct MockBuffer {
    size: u64,
    data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    /// Snapshot of the buffer contents
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl GpuBuffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut bytes = self.data.lock().unwrap();
        let end = offset as usize + data.len();
        if end > bytes.len() {
            return Err(Error::BackendError(format!(
                "buffer write of {} bytes at offset {} exceeds size {}",
                data.len(),
                offset,
                self.size
            )));
        }
        bytes[offset as usize..end].copy_from_slice(data);
        Ok(())
    }
}

pub struct MockShaderModule;

impl GpuShaderModule for MockShaderModule {}

pub struct MockPipeline {
    pub label: String,
    pub subpass: u32,
}

impl GpuPipeline for MockPipeline {}

pub struct MockDescriptorSet {
    kind: DescriptorSetKind,
}

impl GpuDescriptorSet for MockDescriptorSet {
    fn kind(&self) -> DescriptorSetKind {
        self.kind
    }
}

// ============================================================================
// Mock command buffer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Primary,
    Secondary,
}

/// Mock command buffer recording each call as a string
pub struct MockCommandBuffer {
    level: Level,
    pub commands: Vec<String>,
}

impl MockCommandBuffer {
    fn push(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }
}

impl GpuCommandBuffer for MockCommandBuffer {
    fn begin(&mut self) -> Result<()> {
        self.push("begin");
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.push("end");
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _render_pass: &Arc<dyn GpuRenderPass>,
        _framebuffer: &Arc<dyn GpuFramebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        if self.level != Level::Primary {
            return Err(Error::InvalidOperation(
                "begin_render_pass on a secondary command buffer".to_string(),
            ));
        }
        self.push(format!("begin_render_pass clears={}", clear_values.len()));
        Ok(())
    }

    fn next_subpass(&mut self) -> Result<()> {
        self.push("next_subpass");
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.push("end_render_pass");
        Ok(())
    }

    fn execute_commands(&mut self, secondaries: Vec<Box<dyn GpuCommandBuffer>>) -> Result<()> {
        if self.level != Level::Primary {
            return Err(Error::InvalidOperation(
                "execute_commands on a secondary command buffer".to_string(),
            ));
        }
        self.push(format!("execute_commands count={}", secondaries.len()));
        Ok(())
    }

    fn set_viewport(&mut self, _viewport: Viewport) -> Result<()> {
        self.push("set_viewport");
        Ok(())
    }

    fn set_scissor(&mut self, _scissor: Rect2D) -> Result<()> {
        self.push("set_scissor");
        Ok(())
    }

    fn bind_pipeline(&mut self, _pipeline: &Arc<dyn GpuPipeline>) -> Result<()> {
        self.push("bind_pipeline");
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        set_index: u32,
        _set: &Arc<dyn GpuDescriptorSet>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.push(format!(
            "bind_descriptor_set set={} offsets={:?}",
            set_index, dynamic_offsets
        ));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, _buffer: &Arc<dyn GpuBuffer>, offset: u64) -> Result<()> {
        self.push(format!("bind_vertex_buffer offset={}", offset));
        Ok(())
    }

    fn bind_index_buffer(
        &mut self,
        _buffer: &Arc<dyn GpuBuffer>,
        offset: u64,
        index_type: IndexType,
    ) -> Result<()> {
        self.push(format!("bind_index_buffer offset={} type={:?}", offset, index_type));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.push(format!("draw vertices={} first={}", vertex_count, first_vertex));
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> Result<()> {
        self.push(format!(
            "draw_indexed indices={} first={} offset={}",
            index_count, first_index, vertex_offset
        ));
        Ok(())
    }
}

// ============================================================================
// Mock device
// ============================================================================

/// Mock GPU device recording every operation
pub struct MockDevice {
    max_samples: SampleCount,
    frames_in_flight: usize,
    operations: Arc<Mutex<Vec<String>>>,
    uniform_buffers: Mutex<Vec<Arc<MockBuffer>>>,
    pipeline_builds: AtomicUsize,
    idle_waits: AtomicUsize,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Self::with_max_samples(SampleCount::X8)
    }

    /// Device whose attachment formats top out at `max_samples`
    pub fn with_max_samples(max_samples: SampleCount) -> Arc<Self> {
        Arc::new(Self {
            max_samples,
            frames_in_flight: 2,
            operations: Arc::new(Mutex::new(Vec::new())),
            uniform_buffers: Mutex::new(Vec::new()),
            pipeline_builds: AtomicUsize::new(0),
            idle_waits: AtomicUsize::new(0),
        })
    }

    fn record(&self, operation: impl Into<String>) {
        self.operations.lock().unwrap().push(operation.into());
    }

    /// All recorded operations, in call order
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().unwrap().clone()
    }

    /// Most recently created uniform buffer
    pub fn last_uniform_buffer(&self) -> Option<Arc<MockBuffer>> {
        self.uniform_buffers.lock().unwrap().last().cloned()
    }

    /// Number of pipelines built (creations + rebuilds)
    pub fn pipeline_build_count(&self) -> usize {
        self.pipeline_builds.load(Ordering::Relaxed)
    }

    /// Number of full device-idle waits
    pub fn idle_wait_count(&self) -> usize {
        self.idle_waits.load(Ordering::Relaxed)
    }
}

impl GpuDevice for MockDevice {
    fn limits(&self) -> DeviceLimits {
        DeviceLimits {
            min_uniform_offset_alignment: 256,
            max_sample_count: self.max_samples,
        }
    }

    fn supports_sample_count(&self, samples: SampleCount) -> bool {
        samples <= self.max_samples
    }

    fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn GpuRenderPass>> {
        self.record(format!(
            "create_render_pass attachments={} subpasses={}",
            desc.attachments.len(),
            desc.subpasses.len()
        ));
        Ok(Arc::new(MockRenderPass {
            attachment_count: desc.attachments.len(),
            subpass_count: desc.subpasses.len(),
        }))
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<Arc<dyn GpuImage>> {
        self.record(format!(
            "create_image {}x{} {:?} samples={}",
            desc.extent.width,
            desc.extent.height,
            desc.format,
            desc.samples.as_u32()
        ));
        Ok(Arc::new(MockImage {
            desc: desc.clone(),
            view: Arc::new(MockImageView),
        }))
    }

    fn create_framebuffer(
        &self,
        _render_pass: &Arc<dyn GpuRenderPass>,
        attachments: &[Arc<dyn GpuImageView>],
        extent: Extent2d,
    ) -> Result<Arc<dyn GpuFramebuffer>> {
        self.record(format!(
            "create_framebuffer {}x{} attachments={}",
            extent.width,
            extent.height,
            attachments.len()
        ));
        Ok(Arc::new(MockFramebuffer {
            extent,
            attachment_count: attachments.len(),
        }))
    }

    fn create_uniform_buffer(&self, size: u64) -> Result<Arc<dyn GpuBuffer>> {
        self.record(format!("create_uniform_buffer size={}", size));
        let buffer = Arc::new(MockBuffer {
            size,
            data: Mutex::new(vec![0; size as usize]),
        });
        self.uniform_buffers.lock().unwrap().push(buffer.clone());
        Ok(buffer)
    }

    fn create_shader_module(&self, bytecode: &[u8]) -> Result<Arc<dyn GpuShaderModule>> {
        self.record(format!("create_shader_module bytes={}", bytecode.len()));
        Ok(Arc::new(MockShaderModule))
    }

    fn create_pipeline(
        &self,
        desc: &PipelineDesc,
        _render_pass: &Arc<dyn GpuRenderPass>,
    ) -> Result<Arc<dyn GpuPipeline>> {
        self.record(format!("create_pipeline '{}' subpass={}", desc.label, desc.subpass));
        self.pipeline_builds.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(MockPipeline {
            label: desc.label.clone(),
            subpass: desc.subpass,
        }))
    }

    fn allocate_descriptor_set(&self, kind: DescriptorSetKind) -> Result<Arc<dyn GpuDescriptorSet>> {
        self.record(format!("allocate_descriptor_set {:?}", kind));
        Ok(Arc::new(MockDescriptorSet { kind }))
    }

    fn update_descriptor_set(
        &self,
        set: &Arc<dyn GpuDescriptorSet>,
        writes: &[DescriptorWrite],
    ) -> Result<()> {
        self.record(format!(
            "update_descriptor_set {:?} writes={}",
            set.kind(),
            writes.len()
        ));
        Ok(())
    }

    fn allocate_primary_command_buffer(&self) -> Result<Box<dyn GpuCommandBuffer>> {
        self.record("allocate_primary_command_buffer");
        Ok(Box::new(MockCommandBuffer {
            level: Level::Primary,
            commands: Vec::new(),
        }))
    }

    fn allocate_secondary_command_buffer(
        &self,
        inheritance: &CommandBufferInheritance,
    ) -> Result<Box<dyn GpuCommandBuffer>> {
        self.record(format!(
            "allocate_secondary_command_buffer subpass={}",
            inheritance.subpass
        ));
        Ok(Box::new(MockCommandBuffer {
            level: Level::Secondary,
            commands: Vec::new(),
        }))
    }

    fn submit(&self, commands: Box<dyn GpuCommandBuffer>, frame_slot: usize) -> Result<()> {
        self.record(format!("submit frame_slot={}", frame_slot));
        drop(commands);
        Ok(())
    }

    fn wait_frame_fence(&self, frame_slot: usize) -> Result<()> {
        self.record(format!("wait_frame_fence frame_slot={}", frame_slot));
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.record("wait_idle");
        self.idle_waits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ============================================================================
// Mock window
// ============================================================================

/// Mock window surface with a rotating set of backbuffers
pub struct MockWindow {
    format: TextureFormat,
    size: Mutex<Extent2d>,
    backbuffers: Mutex<Vec<Arc<MockImageView>>>,
    has_renderer: AtomicBool,
    next_image: AtomicU32,
    presented: Mutex<Vec<u32>>,
}

impl MockWindow {
    pub fn new(format: TextureFormat, size: Extent2d) -> Arc<Self> {
        Arc::new(Self {
            format,
            size: Mutex::new(size),
            backbuffers: Mutex::new((0..3).map(|_| Arc::new(MockImageView)).collect()),
            has_renderer: AtomicBool::new(false),
            next_image: AtomicU32::new(0),
            presented: Mutex::new(Vec::new()),
        })
    }

    /// Simulate the windowing layer resizing the surface and recreating its
    /// backbuffers (it waits for device idle before notifying renderers)
    pub fn resize(&self, size: Extent2d) {
        *self.size.lock().unwrap() = size;
        let mut backbuffers = self.backbuffers.lock().unwrap();
        let count = backbuffers.len();
        *backbuffers = (0..count).map(|_| Arc::new(MockImageView)).collect();
    }

    /// Indices presented so far, in order
    pub fn presented(&self) -> Vec<u32> {
        self.presented.lock().unwrap().clone()
    }
}

impl RenderWindow for MockWindow {
    fn surface_format(&self) -> TextureFormat {
        self.format
    }

    fn size(&self) -> Extent2d {
        *self.size.lock().unwrap()
    }

    fn backbuffer_count(&self) -> usize {
        self.backbuffers.lock().unwrap().len()
    }

    fn backbuffer_view(&self, index: usize) -> Arc<dyn GpuImageView> {
        self.backbuffers.lock().unwrap()[index].clone()
    }

    fn has_renderer(&self) -> bool {
        self.has_renderer.load(Ordering::Acquire)
    }

    fn set_has_renderer(&self, attached: bool) {
        self.has_renderer.store(attached, Ordering::Release);
    }

    fn acquire_next_image(&self) -> Result<u32> {
        let count = self.backbuffer_count() as u32;
        Ok(self.next_image.fetch_add(1, Ordering::Relaxed) % count)
    }

    fn present(&self, image_index: u32) -> Result<()> {
        self.presented.lock().unwrap().push(image_index);
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_tests.rs"]
mod tests;
