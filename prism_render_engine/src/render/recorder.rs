/// CommandRecorder / CommandList - secondary command buffer recording
///
/// Recorders produce subpass-scoped secondary command buffers that can be
/// built on worker threads while the owning renderer's primary sequence
/// runs elsewhere; submission back into the primary sequence is serial.
/// A finished recording becomes a single-use `CommandList` token carrying
/// the renderer, subpass and frame it was recorded for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine_bail;
use crate::error::Result;
use crate::gpu::{CommandBufferInheritance, GpuCommandBuffer, GpuDevice};
use crate::render::renderer::{Renderer, RendererId};

/// A recorded, renderer-and-subpass-scoped secondary command buffer
///
/// Single-use: submission invalidates the list. A list can only be
/// submitted to the renderer it was recorded for, on the subpass it was
/// recorded for, during the frame it was recorded in.
pub struct CommandList {
    buffer: Option<Box<dyn GpuCommandBuffer>>,
    renderer: RendererId,
    subpass: u32,
    frame: u64,
}

impl CommandList {
    /// Whether the list can still be submitted
    pub fn is_valid(&self) -> bool {
        self.buffer.is_some()
    }

    /// The renderer this list was recorded for
    pub fn renderer(&self) -> RendererId {
        self.renderer
    }

    /// The subpass this list was recorded for
    pub fn subpass(&self) -> u32 {
        self.subpass
    }

    pub(crate) fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn take_buffer(&mut self) -> Option<Box<dyn GpuCommandBuffer>> {
        self.buffer.take()
    }
}

struct ActiveRecording {
    buffer: Box<dyn GpuCommandBuffer>,
    renderer: RendererId,
    subpass: u32,
    /// Renderer frame counter value captured at begin
    frame: u64,
    /// Live handle onto the renderer's frame counter, for staleness checks
    frame_counter: Arc<AtomicU64>,
}

/// Records secondary command buffers scoped to one renderer subpass
pub struct CommandRecorder {
    device: Arc<dyn GpuDevice>,
    active: Option<ActiveRecording>,
}

impl CommandRecorder {
    pub fn new(device: Arc<dyn GpuDevice>) -> Self {
        Self { device, active: None }
    }

    /// Whether a recording is in progress
    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Begin recording for `subpass` of `renderer`
    ///
    /// The secondary buffer inherits the renderer's active render pass,
    /// the subpass index and the current framebuffer, so the renderer must
    /// be mid-recording (between `begin` and `end`). Recording may then
    /// proceed concurrently with the renderer's primary sequence.
    ///
    /// # Errors
    ///
    /// Fails if this recorder is already recording, `subpass` is out of
    /// range, or the renderer is not currently recording a frame.
    pub fn begin(&mut self, renderer: &Renderer, subpass: u32) -> Result<()> {
        if self.active.is_some() {
            engine_bail!("prism3d::CommandRecorder", "begin: already recording");
        }
        if subpass >= renderer.subpass_count() {
            engine_bail!(
                "prism3d::CommandRecorder",
                "begin: subpass {} out of range (renderer has {})",
                subpass,
                renderer.subpass_count()
            );
        }

        let context = renderer.recording_context()?;
        let mut buffer = self
            .device
            .allocate_secondary_command_buffer(&CommandBufferInheritance {
                render_pass: context.render_pass,
                subpass,
                framebuffer: context.framebuffer,
            })?;
        buffer.begin()?;

        self.active = Some(ActiveRecording {
            buffer,
            renderer: context.renderer,
            subpass,
            frame: context.frame,
            frame_counter: context.frame_counter,
        });
        Ok(())
    }

    /// Access the command buffer being recorded, for draw/bind commands
    pub fn commands(&mut self) -> Result<&mut dyn GpuCommandBuffer> {
        match &mut self.active {
            Some(active) => Ok(active.buffer.as_mut()),
            None => {
                engine_bail!("prism3d::CommandRecorder", "commands: not recording");
            }
        }
    }

    /// Finish recording and produce a submit-ready `CommandList`
    ///
    /// # Errors
    ///
    /// Fails if not recording, or if the renderer has begun a new frame
    /// since recording started: a stale recording references the previous
    /// frame's state and must be discarded, never submitted. On staleness
    /// the buffer is released and the recorder returns to idle.
    pub fn end(&mut self) -> Result<CommandList> {
        let Some(mut active) = self.active.take() else {
            engine_bail!("prism3d::CommandRecorder", "end: not recording");
        };

        if active.frame_counter.load(Ordering::Acquire) != active.frame {
            drop(active);
            engine_bail!(
                "prism3d::CommandRecorder",
                "end: renderer advanced past the recorded frame; recording discarded"
            );
        }

        active.buffer.end()?;
        Ok(CommandList {
            buffer: Some(active.buffer),
            renderer: active.renderer,
            subpass: active.subpass,
            frame: active.frame,
        })
    }

    /// Abandon the in-progress recording without producing a list
    ///
    /// The buffer returns to its pool unexecuted. Only valid while
    /// recording.
    pub fn discard(&mut self) -> Result<()> {
        if self.active.take().is_none() {
            engine_bail!("prism3d::CommandRecorder", "discard: not recording");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
