//! Application context: GPU plumbing shared across all app methods.

use std::sync::Arc;

use anyhow::Context as _;
use ash::vk;
use lumen_gpu::{
    DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorWriter, DeviceBuffer, GpuContext, SurfaceContext, MAX_FRAMES_IN_FLIGHT,
};
use lumen_render::{
    destroy_scheduler, FrameScheduler, GlobalUbo, MeshRegistry, PresentationEngine,
    VulkanPresentation, VulkanRecorder, VulkanScheduler,
};
use winit::window::Window;

use crate::config::AppConfig;
use crate::window::WindowState;

/// Everything the runner and the application share: the GPU context, the
/// frame scheduler, per-slot uniform buffers, and the global descriptor
/// sets.
///
/// Uniform data flow: one host-visible buffer per frame slot, mapped once
/// at creation; one descriptor set per slot, written once here at setup.
/// Contents change per frame, bindings never rebind.
pub struct AppContext {
    pub gpu: Arc<GpuContext>,
    pub scheduler: VulkanScheduler<WindowState>,
    pub meshes: MeshRegistry,

    global_layout: DescriptorSetLayout,
    global_pool: DescriptorPool,
    global_sets: Vec<vk::DescriptorSet>,
    ubo_buffers: Vec<DeviceBuffer>,
}

impl AppContext {
    /// Build the context for a freshly created window.
    ///
    /// # Safety
    /// The window must have valid display and window handles.
    pub(crate) unsafe fn new(
        window: Arc<Window>,
        gpu: Arc<GpuContext>,
        config: &AppConfig,
    ) -> anyhow::Result<Self> {
        let surface = unsafe { SurfaceContext::from_window(&gpu, window.as_ref())? };

        let size = window.inner_size();
        let presentation = unsafe {
            VulkanPresentation::new(
                Arc::clone(&gpu),
                surface,
                size.width.max(1),
                size.height.max(1),
                config.vsync,
            )?
        };
        let recorder = VulkanRecorder::new(Arc::clone(&gpu))?;
        let scheduler =
            FrameScheduler::new(presentation, WindowState::new(window), recorder)?;

        let mut ubo_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            let mut buffer = DeviceBuffer::new(
                &gpu,
                GlobalUbo::SIZE,
                1,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                gpu.capabilities().min_uniform_buffer_offset_alignment,
                &format!("global ubo {slot}"),
            )?;
            buffer.map()?;
            ubo_buffers.push(buffer);
        }

        let global_layout = unsafe {
            DescriptorSetLayoutBuilder::new()
                .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
                .build(gpu.device())?
        };

        // Sized for exactly one set per frame slot; exhaustion here is a
        // setup bug, not a runtime condition.
        let mut global_pool = unsafe {
            DescriptorPoolBuilder::new()
                .pool_size(
                    vk::DescriptorType::UNIFORM_BUFFER,
                    MAX_FRAMES_IN_FLIGHT as u32,
                )
                .max_sets(MAX_FRAMES_IN_FLIGHT as u32)
                .build(gpu.device())?
        };

        let mut global_sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for buffer in &ubo_buffers {
            let info = buffer.descriptor_info(GlobalUbo::SIZE, 0);
            let set = unsafe {
                DescriptorWriter::new(&global_layout)
                    .write_buffer(0, &info)?
                    .build(gpu.device(), &mut global_pool)?
            }
            .context("global descriptor pool exhausted at setup")?;
            global_sets.push(set);
        }

        let meshes = MeshRegistry::new(&gpu)?;

        Ok(Self {
            gpu,
            scheduler,
            meshes,
            global_layout,
            global_pool,
            global_sets,
            ubo_buffers,
        })
    }

    /// Layout of the per-frame global descriptor set, for pipeline creation.
    pub fn global_set_layout(&self) -> vk::DescriptorSetLayout {
        self.global_layout.handle()
    }

    /// The global descriptor set bound for frame slot `slot`.
    pub fn global_set(&self, slot: usize) -> vk::DescriptorSet {
        self.global_sets[slot]
    }

    /// The render pass rendering currently targets.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.scheduler.presentation().render_pass()
    }

    /// Copy `ubo` into frame slot `slot`'s uniform buffer.
    ///
    /// The memory is host-coherent, so no flush is needed.
    pub fn write_global_ubo(&mut self, slot: usize, ubo: &GlobalUbo) -> anyhow::Result<()> {
        self.ubo_buffers[slot].write_to_buffer(bytemuck::bytes_of(ubo), vk::WHOLE_SIZE, 0)?;
        Ok(())
    }

    /// Tear down everything in dependency order.
    ///
    /// # Safety
    /// No frame may be in flight; the caller waits for device idle first.
    pub(crate) unsafe fn destroy(mut self) {
        unsafe {
            self.meshes.destroy(&self.gpu);
            for buffer in &mut self.ubo_buffers {
                buffer.destroy(&self.gpu);
            }
            self.global_pool.destroy(self.gpu.device());
            self.global_layout.destroy(self.gpu.device());
            destroy_scheduler(self.scheduler);
        }
    }
}
