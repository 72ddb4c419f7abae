/// UniformPushBuffer - per-frame ring-buffered staging for small uniform data
///
/// One backing buffer split into equal regions, one per frame in flight.
/// Writes advance a cursor inside the current frame's region; `next_frame`
/// moves to the next region after waiting for the GPU to be done with it.
/// Overflow is an expected condition reported as a value, not an error.

use std::sync::Arc;

use bytemuck::Pod;

use crate::engine_bail;
use crate::error::Result;
use crate::gpu::{GpuBuffer, GpuDevice};

/// Per-frame ring-buffered uniform staging area
pub struct UniformPushBuffer {
    device: Arc<dyn GpuDevice>,
    buffer: Arc<dyn GpuBuffer>,
    /// Capacity of one frame's region, in bytes (alignment-rounded)
    frame_capacity: u64,
    frames_in_flight: usize,
    /// Dynamic uniform offset alignment from the device limits
    alignment: u64,
    frame_slot: usize,
    cursor: u64,
}

impl UniformPushBuffer {
    /// Allocate a push buffer with `frame_capacity` bytes per frame in flight
    ///
    /// # Errors
    ///
    /// Fails for a zero capacity, or when the backing buffer would exceed
    /// the `u32` range that dynamic uniform offsets address.
    pub fn new(device: Arc<dyn GpuDevice>, frame_capacity: u64) -> Result<Self> {
        if frame_capacity == 0 {
            engine_bail!("prism3d::UniformPushBuffer", "frame capacity must be non-zero");
        }
        let alignment = device.limits().min_uniform_offset_alignment.max(1);
        let frames_in_flight = device.frames_in_flight();
        // Push offsets are handed out as u32 dynamic uniform offsets, so
        // every region must stay addressable in that range.
        if frame_capacity > u64::from(u32::MAX) {
            engine_bail!(
                "prism3d::UniformPushBuffer",
                "frame capacity {} exceeds the u32 dynamic-offset range",
                frame_capacity
            );
        }
        let frame_capacity = align_up(frame_capacity, alignment);
        if frame_capacity * frames_in_flight as u64 > u64::from(u32::MAX) {
            engine_bail!(
                "prism3d::UniformPushBuffer",
                "frame capacity {} with {} frames in flight exceeds the u32 dynamic-offset range",
                frame_capacity,
                frames_in_flight
            );
        }
        let buffer = device.create_uniform_buffer(frame_capacity * frames_in_flight as u64)?;
        Ok(Self {
            device,
            buffer,
            frame_capacity,
            frames_in_flight,
            alignment,
            frame_slot: 0,
            cursor: 0,
        })
    }

    /// Copy raw bytes into the current frame's region
    ///
    /// # Returns
    ///
    /// `Ok(Some(offset))` with the byte offset of the write (usable as a
    /// dynamic uniform offset), or `Ok(None)` if the region's remaining
    /// capacity is insufficient. Overflow never corrupts data already
    /// written this frame; callers react per-call (split across frames or
    /// configure a larger capacity).
    pub fn try_push_data(&mut self, data: &[u8]) -> Result<Option<u32>> {
        let size = align_up(data.len() as u64, self.alignment);
        if self.cursor + size > self.frame_capacity {
            return Ok(None);
        }
        let offset = self.frame_slot as u64 * self.frame_capacity + self.cursor;
        self.buffer.write(offset, data)?;
        self.cursor += size;
        Ok(Some(offset as u32))
    }

    /// Copy a POD value into the current frame's region
    ///
    /// Same result contract as [`try_push_data`](Self::try_push_data).
    pub fn try_push<T: Pod>(&mut self, value: &T) -> Result<Option<u32>> {
        self.try_push_data(bytemuck::bytes_of(value))
    }

    /// Advance to the next frame-in-flight's region and reset its cursor
    ///
    /// Blocks until the GPU has finished consuming the region from its
    /// previous use. This is the frames-in-flight backpressure point.
    pub fn next_frame(&mut self) -> Result<()> {
        self.frame_slot = (self.frame_slot + 1) % self.frames_in_flight;
        self.device.wait_frame_fence(self.frame_slot)?;
        self.cursor = 0;
        Ok(())
    }

    /// The backing buffer (bound once into the uniform descriptor set)
    pub fn buffer(&self) -> &Arc<dyn GpuBuffer> {
        &self.buffer
    }

    /// Current frame-in-flight slot
    pub fn frame_slot(&self) -> usize {
        self.frame_slot
    }

    /// Bytes still available in the current frame's region
    pub fn remaining(&self) -> u64 {
        self.frame_capacity - self.cursor
    }

    /// Capacity of one frame's region in bytes
    pub fn frame_capacity(&self) -> u64 {
        self.frame_capacity
    }
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
#[path = "push_buffer_tests.rs"]
mod tests;
