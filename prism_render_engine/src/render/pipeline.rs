/// Pipeline - a pipeline object tracked by its owning renderer
///
/// A pipeline is built against the renderer's current render pass and
/// becomes invalid whenever that render pass is replaced (MSAA change).
/// The renderer keeps a non-owning tracked set so it can broadcast rebuilds;
/// dropping a Pipeline removes it from the set first, then releases the GPU
/// object.

use std::sync::{Arc, Mutex, Weak};

use slotmap::{new_key_type, SlotMap};

use crate::engine_debug;
use crate::error::Result;
use crate::gpu::{GpuDevice, GpuPipeline, GpuRenderPass, PipelineDesc};

new_key_type! {
    /// Key into a renderer's tracked pipeline set
    pub struct PipelineKey;
}

/// Shared slot: the descriptor (for rebuilds) plus the live GPU object
pub(crate) struct PipelineSlot {
    desc: PipelineDesc,
    handle: Mutex<Arc<dyn GpuPipeline>>,
}

/// The tracked set guarded by a dedicated lock; disposal can race with
/// rebuild broadcasts
pub(crate) type PipelineSet = Mutex<SlotMap<PipelineKey, Weak<PipelineSlot>>>;

/// A graphics pipeline owned by the caller, tracked by one renderer
pub struct Pipeline {
    slot: Arc<PipelineSlot>,
    key: PipelineKey,
    set: Arc<PipelineSet>,
}

impl Pipeline {
    pub(crate) fn create(
        device: &Arc<dyn GpuDevice>,
        set: &Arc<PipelineSet>,
        render_pass: &Arc<dyn GpuRenderPass>,
        desc: PipelineDesc,
    ) -> Result<Self> {
        let handle = device.create_pipeline(&desc, render_pass)?;
        let slot = Arc::new(PipelineSlot {
            desc,
            handle: Mutex::new(handle),
        });
        let key = set
            .lock()
            .expect("pipeline set lock poisoned")
            .insert(Arc::downgrade(&slot));
        Ok(Self { slot, key, set: set.clone() })
    }

    /// The subpass this pipeline draws in
    pub fn subpass(&self) -> u32 {
        self.slot.desc.subpass
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.slot.desc.label
    }

    /// Current GPU pipeline object
    ///
    /// Re-fetch after any renderer reconfiguration; the handle is replaced
    /// when the renderer's render pass changes.
    pub fn handle(&self) -> Arc<dyn GpuPipeline> {
        self.slot.handle.lock().expect("pipeline handle lock poisoned").clone()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Leave the tracked set before the GPU object can go away, so a
        // concurrent rebuild broadcast never sees a dangling slot.
        self.set
            .lock()
            .expect("pipeline set lock poisoned")
            .remove(self.key);
    }
}

/// Rebuild every live tracked pipeline against a new render pass
pub(crate) fn rebuild_all(
    set: &Arc<PipelineSet>,
    device: &Arc<dyn GpuDevice>,
    render_pass: &Arc<dyn GpuRenderPass>,
) -> Result<()> {
    let slots: Vec<Arc<PipelineSlot>> = set
        .lock()
        .expect("pipeline set lock poisoned")
        .values()
        .filter_map(Weak::upgrade)
        .collect();

    for slot in &slots {
        let rebuilt = device.create_pipeline(&slot.desc, render_pass)?;
        *slot.handle.lock().expect("pipeline handle lock poisoned") = rebuilt;
        engine_debug!("prism3d::Pipeline", "rebuilt pipeline '{}'", slot.desc.label);
    }
    Ok(())
}
