//! Vulkan implementations of the scheduler seams.

use crate::backend::{CommandRecorder, PresentationEngine, WindowTarget};
use crate::error::Result;
use crate::scheduler::FrameScheduler;
use ash::vk;
use lumen_gpu::command::{begin_command_buffer, end_command_buffer};
use lumen_gpu::{CommandPool, GpuContext, SurfaceContext, SurfaceStatus, Swapchain};
use std::sync::Arc;

/// Clear color for the main render pass.
const CLEAR_COLOR: [f32; 4] = [0.01, 0.01, 0.01, 1.0];

/// [`PresentationEngine`] backed by a Vulkan surface and swapchain.
pub struct VulkanPresentation {
    gpu: Arc<GpuContext>,
    surface: SurfaceContext,
    swapchain: Swapchain,
    vsync: bool,
}

impl VulkanPresentation {
    /// Create the surface's first swapchain.
    ///
    /// # Safety
    /// The surface must belong to the GPU context's instance.
    pub unsafe fn new(
        gpu: Arc<GpuContext>,
        surface: SurfaceContext,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self> {
        let swapchain = unsafe { surface.create_swapchain(&gpu, width, height, vsync) }?;
        Ok(Self {
            gpu,
            surface,
            swapchain,
            vsync,
        })
    }

    /// The current swapchain.
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Release the swapchain and surface.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self) {
        unsafe {
            self.swapchain.destroy(&self.gpu, &self.surface);
            self.surface.destroy();
        }
    }
}

impl PresentationEngine for VulkanPresentation {
    fn acquire_next_image(&mut self, slot: usize) -> Result<(u32, SurfaceStatus)> {
        let acquired = unsafe {
            self.swapchain
                .acquire_next_image(&self.gpu, &self.surface, slot)?
        };
        Ok(acquired)
    }

    fn submit_and_present(
        &mut self,
        cmd: vk::CommandBuffer,
        image_index: u32,
        slot: usize,
    ) -> Result<SurfaceStatus> {
        let status = unsafe {
            self.swapchain
                .submit_and_present(&self.gpu, &self.surface, cmd, image_index, slot)?
        };
        Ok(status)
    }

    fn recreate(&mut self, extent: vk::Extent2D) -> Result<bool> {
        let (swapchain, formats_match) = unsafe {
            self.surface.recreate_swapchain(
                &self.gpu,
                &mut self.swapchain,
                extent.width,
                extent.height,
                self.vsync,
            )?
        };
        self.swapchain = swapchain;
        Ok(formats_match)
    }

    fn wait_idle(&self) -> Result<()> {
        self.gpu.wait_idle()?;
        Ok(())
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.swapchain.render_pass()
    }

    fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.swapchain.framebuffer(image_index)
    }

    fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

/// [`CommandRecorder`] backed by a Vulkan command pool on the graphics queue.
pub struct VulkanRecorder {
    gpu: Arc<GpuContext>,
    pool: CommandPool,
}

impl VulkanRecorder {
    /// Create the per-frame command pool.
    pub fn new(gpu: Arc<GpuContext>) -> Result<Self> {
        let pool = unsafe {
            CommandPool::new(
                gpu.device(),
                gpu.graphics_queue_family(),
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )?
        };
        Ok(Self { gpu, pool })
    }

    /// Release the pool and everything allocated from it.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self) {
        unsafe { self.pool.destroy(self.gpu.device()) };
    }
}

impl CommandRecorder for VulkanRecorder {
    fn allocate_command_buffers(&mut self, count: usize) -> Result<Vec<vk::CommandBuffer>> {
        let buffers = unsafe {
            self.pool.allocate_command_buffers(
                self.gpu.device(),
                vk::CommandBufferLevel::PRIMARY,
                count as u32,
            )?
        };
        Ok(buffers)
    }

    fn free_command_buffers(&mut self, buffers: &[vk::CommandBuffer]) {
        unsafe {
            self.pool.free_command_buffers(self.gpu.device(), buffers);
        }
    }

    fn begin(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe {
            begin_command_buffer(self.gpu.device(), cmd, vk::CommandBufferUsageFlags::empty())?;
        }
        Ok(())
    }

    fn end(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe {
            end_command_buffer(self.gpu.device(), cmd)?;
        }
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let device = self.gpu.device();
        unsafe {
            device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    fn end_render_pass(&mut self, cmd: vk::CommandBuffer) {
        unsafe {
            self.gpu.device().cmd_end_render_pass(cmd);
        }
    }
}

/// Scheduler type wired to the Vulkan backends.
pub type VulkanScheduler<W> = FrameScheduler<VulkanPresentation, W, VulkanRecorder>;

/// Tear down a Vulkan-backed scheduler in dependency order.
///
/// # Safety
/// The device must be idle.
pub unsafe fn destroy_scheduler<W: WindowTarget>(scheduler: VulkanScheduler<W>) {
    let (mut presentation, _window, mut recorder, buffers) = scheduler.into_parts();
    recorder.free_command_buffers(&buffers);
    unsafe {
        recorder.destroy();
        presentation.destroy();
    }
}
