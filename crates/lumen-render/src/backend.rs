//! Seams between the frame scheduler and the platform.
//!
//! The scheduler drives three collaborators it only knows through these
//! traits: the presentation engine (swapchain), the window, and the command
//! recorder. Production code wires up the Vulkan implementations in
//! [`crate::vulkan`]; the scheduler tests substitute fakes.

use crate::error::Result;
use ash::vk;
use lumen_gpu::SurfaceStatus;

/// The presentable surface and its submission queue.
pub trait PresentationEngine {
    /// Acquire the next presentable image for the given frame slot.
    ///
    /// Waits for the slot's previous submission to retire. A recoverable
    /// error (stale surface) means no image was acquired.
    fn acquire_next_image(&mut self, slot: usize) -> Result<(u32, SurfaceStatus)>;

    /// Submit a recorded command buffer for `image_index` and present it.
    fn submit_and_present(
        &mut self,
        cmd: vk::CommandBuffer,
        image_index: u32,
        slot: usize,
    ) -> Result<SurfaceStatus>;

    /// Replace the swapchain for a new drawable extent.
    ///
    /// Returns whether the new surface's color and depth formats match the
    /// old ones (pipelines stay valid only when they do).
    fn recreate(&mut self, extent: vk::Extent2D) -> Result<bool>;

    /// Block until the device has finished all submitted work.
    fn wait_idle(&self) -> Result<()>;

    /// The render pass targeting this surface.
    fn render_pass(&self) -> vk::RenderPass;

    /// Framebuffer for a given image index.
    fn framebuffer(&self, image_index: u32) -> vk::Framebuffer;

    /// Current surface extent.
    fn extent(&self) -> vk::Extent2D;
}

/// The window the surface presents into.
pub trait WindowTarget {
    /// Current drawable size in pixels. May be zero while minimized.
    fn drawable_extent(&self) -> vk::Extent2D;

    /// Whether the window was resized since the flag was last reset.
    fn was_resized(&self) -> bool;

    /// Clear the resized flag.
    fn reset_resized_flag(&mut self);

    /// Block until window events may have changed the drawable extent.
    fn wait_events(&mut self);
}

/// Allocates and records per-frame command buffers.
pub trait CommandRecorder {
    /// Allocate `count` primary command buffers.
    fn allocate_command_buffers(&mut self, count: usize) -> Result<Vec<vk::CommandBuffer>>;

    /// Return command buffers to the pool.
    fn free_command_buffers(&mut self, buffers: &[vk::CommandBuffer]);

    /// Begin recording. Implicitly resets the buffer.
    fn begin(&mut self, cmd: vk::CommandBuffer) -> Result<()>;

    /// Finish recording.
    fn end(&mut self, cmd: vk::CommandBuffer) -> Result<()>;

    /// Record a render pass begin, including viewport and scissor setup.
    fn begin_render_pass(
        &mut self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    );

    /// Record the matching render pass end.
    fn end_render_pass(&mut self, cmd: vk::CommandBuffer);
}
