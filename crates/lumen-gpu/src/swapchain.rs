//! Swapchain management.
//!
//! The swapchain owns everything tied to the presentable surface: the
//! images and views, the depth buffer, the render pass and framebuffers,
//! and the per-slot synchronization objects. Recreating the swapchain
//! replaces all of it in one step.

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::memory::GpuImage;
use crate::surface::SurfaceContext;
use crate::sync::FrameSync;
use ash::vk;
use gpu_allocator::MemoryLocation;

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Whether the presented surface still matches the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// The surface is usable as-is.
    Optimal,
    /// The surface no longer matches the window; recreate the swapchain.
    Stale,
}

/// Swapchain wrapper.
pub struct Swapchain {
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    color_format: vk::Format,
    depth_format: vk::Format,
    extent: vk::Extent2D,

    depth_images: Vec<GpuImage>,
    depth_image_views: Vec<vk::ImageView>,

    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    sync: Vec<FrameSync>,
    // Fence of the slot whose submission last used each image
    images_in_flight: Vec<vk::Fence>,
}

impl Swapchain {
    /// Create a new swapchain.
    ///
    /// # Safety
    /// The GPU context and surface must be valid. When `old_swapchain` is
    /// given its handle is consumed by the driver; the caller still owns
    /// the rest of the old swapchain's resources.
    pub unsafe fn new(
        gpu: &GpuContext,
        surface: &SurfaceContext,
        width: u32,
        height: u32,
        vsync: bool,
        old_swapchain: Option<vk::SwapchainKHR>,
    ) -> Result<Self> {
        let caps = surface.capabilities(gpu)?;
        let surface_format = select_surface_format(&caps.formats);
        let present_mode = select_present_mode(&caps.present_modes, vsync);
        let extent = calculate_extent(&caps.capabilities, width, height);

        // Determine image count
        let mut image_count = caps.capabilities.min_image_count + 1;
        if caps.capabilities.max_image_count > 0 && image_count > caps.capabilities.max_image_count
        {
            image_count = caps.capabilities.max_image_count;
        }

        let queue_families = [gpu.graphics_queue_family()];
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&queue_families)
            .pre_transform(caps.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain.unwrap_or(vk::SwapchainKHR::null()));

        let swapchain = unsafe { surface.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let device = gpu.device();

        // Get swapchain images
        let images = unsafe { surface.swapchain_loader.get_swapchain_images(swapchain) }?;

        // Create image views
        let image_views: Vec<_> = images
            .iter()
            .map(|&image| {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .components(vk::ComponentMapping::default())
                    .subresource_range(
                        vk::ImageSubresourceRange::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .base_mip_level(0)
                            .level_count(1)
                            .base_array_layer(0)
                            .layer_count(1),
                    );

                unsafe { device.create_image_view(&view_info, None) }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Depth buffer, one per swapchain image
        let depth_format = gpu.find_supported_format(
            &[
                vk::Format::D32_SFLOAT,
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D24_UNORM_S8_UINT,
            ],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        let mut depth_images = Vec::with_capacity(images.len());
        let mut depth_image_views = Vec::with_capacity(images.len());
        for i in 0..images.len() {
            let depth_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(depth_format)
                .extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let depth_image = gpu.allocator().lock().create_image(
                &depth_info,
                MemoryLocation::GpuOnly,
                &format!("swapchain depth {i}"),
            )?;

            let view_info = vk::ImageViewCreateInfo::default()
                .image(depth_image.image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(depth_format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::DEPTH)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            let depth_view = unsafe { device.create_image_view(&view_info, None) }?;

            depth_images.push(depth_image);
            depth_image_views.push(depth_view);
        }

        // Render pass with one color and one depth attachment
        let render_pass = unsafe { create_render_pass(device, surface_format.format, depth_format) }?;

        // Framebuffers, one per swapchain image
        let framebuffers: Vec<_> = image_views
            .iter()
            .zip(&depth_image_views)
            .map(|(&color, &depth)| {
                let attachments = [color, depth];
                let fb_info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);
                unsafe { device.create_framebuffer(&fb_info, None) }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Per-slot sync objects
        let mut sync = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            sync.push(unsafe { FrameSync::new(device) }?);
        }
        let images_in_flight = vec![vk::Fence::null(); images.len()];

        Ok(Self {
            swapchain,
            images,
            image_views,
            color_format: surface_format.format,
            depth_format,
            extent,
            depth_images,
            depth_image_views,
            render_pass,
            framebuffers,
            sync,
            images_in_flight,
        })
    }

    /// Raw swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Number of presentable images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// The render pass that targets this swapchain.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Framebuffer for the given image index.
    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    /// Current extent in pixels.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Color attachment format.
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    /// Depth attachment format.
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Width over height of the current extent.
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }

    /// Whether `other` uses the same color and depth formats.
    ///
    /// Pipelines built against one render pass stay valid across a
    /// recreation only when this holds.
    pub fn compare_formats(&self, other: &Self) -> bool {
        self.color_format == other.color_format && self.depth_format == other.depth_format
    }

    /// Sync objects for the given frame slot.
    pub fn slot_sync(&self, slot: usize) -> &FrameSync {
        &self.sync[slot]
    }

    /// Acquire the next presentable image for `slot`.
    ///
    /// Waits for the slot's previous submission to retire first. On
    /// `ERROR_OUT_OF_DATE_KHR` no image was acquired and the error is
    /// returned (recoverable); a suboptimal acquire still yields an image
    /// but reports [`SurfaceStatus::Stale`].
    ///
    /// # Safety
    /// The GPU context and surface must be valid.
    pub unsafe fn acquire_next_image(
        &self,
        gpu: &GpuContext,
        surface: &SurfaceContext,
        slot: usize,
    ) -> Result<(u32, SurfaceStatus)> {
        unsafe { self.sync[slot].wait(gpu.device()) }?;

        let result = unsafe {
            surface.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                self.sync[slot].image_available,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, false)) => Ok((index, SurfaceStatus::Optimal)),
            Ok((index, true)) => Ok((index, SurfaceStatus::Stale)),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Submit a recorded command buffer for `image_index` and present it.
    ///
    /// Handles the image-in-flight fence dance: if another slot's
    /// submission still owns this image, wait for it before resubmitting.
    ///
    /// # Safety
    /// The command buffer must be fully recorded and target this
    /// swapchain's framebuffer for `image_index`.
    pub unsafe fn submit_and_present(
        &mut self,
        gpu: &GpuContext,
        surface: &SurfaceContext,
        cmd: vk::CommandBuffer,
        image_index: u32,
        slot: usize,
    ) -> Result<SurfaceStatus> {
        let device = gpu.device();
        let image_fence = self.images_in_flight[image_index as usize];
        if image_fence != vk::Fence::null() {
            unsafe { device.wait_for_fences(&[image_fence], true, u64::MAX) }?;
        }
        self.images_in_flight[image_index as usize] = self.sync[slot].in_flight;

        unsafe { self.sync[slot].reset(device) }?;

        let wait_semaphores = [self.sync[slot].image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.sync[slot].render_finished];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device.queue_submit(
                gpu.graphics_queue(),
                &[submit_info],
                self.sync[slot].in_flight,
            )
        }?;

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            surface
                .swapchain_loader
                .queue_present(gpu.graphics_queue(), &present_info)
        };

        match result {
            Ok(false) => Ok(SurfaceStatus::Optimal),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SurfaceStatus::Stale),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Destroy the swapchain and everything it owns.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext, surface: &SurfaceContext) {
        let device = gpu.device();

        for sync in &self.sync {
            unsafe { sync.destroy(device) };
        }
        self.sync.clear();

        for &fb in &self.framebuffers {
            unsafe { device.destroy_framebuffer(fb, None) };
        }
        self.framebuffers.clear();

        unsafe { device.destroy_render_pass(self.render_pass, None) };
        self.render_pass = vk::RenderPass::null();

        for &view in &self.depth_image_views {
            unsafe { device.destroy_image_view(view, None) };
        }
        self.depth_image_views.clear();

        for image in &mut self.depth_images {
            if let Err(e) = gpu.allocator().lock().free_image(image) {
                tracing::warn!("failed to free depth image: {e}");
            }
        }
        self.depth_images.clear();

        for &view in &self.image_views {
            unsafe { device.destroy_image_view(view, None) };
        }
        self.image_views.clear();

        unsafe {
            surface
                .swapchain_loader
                .destroy_swapchain(self.swapchain, None);
        }
        self.swapchain = vk::SwapchainKHR::null();
    }
}

/// Create a render pass with one color and one depth attachment.
///
/// # Safety
/// The device must be valid.
unsafe fn create_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> Result<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::default()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let depth_attachment = vk::AttachmentDescription::default()
        .format(depth_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let color_ref = vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    let depth_ref = vk::AttachmentReference::default()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(std::slice::from_ref(&color_ref))
        .depth_stencil_attachment(&depth_ref);

    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        );

    let attachments = [color_attachment, depth_attachment];
    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(std::slice::from_ref(&dependency));

    let render_pass = unsafe { device.create_render_pass(&create_info, None) }?;
    Ok(render_pass)
}

/// Select the best surface format.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    // Prefer SRGB
    for format in available {
        if format.format == vk::Format::B8G8R8A8_SRGB
            && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        {
            return *format;
        }
    }

    // Fall back to first available
    available[0]
}

/// Select the best present mode.
pub fn select_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        // FIFO is always supported
        vk::PresentModeKHR::FIFO
    } else {
        // Prefer mailbox (triple buffering without tearing)
        for &mode in available {
            if mode == vk::PresentModeKHR::MAILBOX {
                return mode;
            }
        }
        for &mode in available {
            if mode == vk::PresentModeKHR::IMMEDIATE {
                return mode;
            }
        }
        vk::PresentModeKHR::FIFO
    }
}

/// Calculate swapchain extent.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_extent_wins_over_desired_size() {
        let caps = vk::SurfaceCapabilitiesKHR::default()
            .current_extent(vk::Extent2D {
                width: 800,
                height: 600,
            });
        let extent = calculate_extent(&caps, 1920, 1080);
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn flexible_extent_clamps_to_limits() {
        let caps = vk::SurfaceCapabilitiesKHR::default()
            .current_extent(vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            })
            .min_image_extent(vk::Extent2D {
                width: 100,
                height: 100,
            })
            .max_image_extent(vk::Extent2D {
                width: 1000,
                height: 1000,
            });

        let extent = calculate_extent(&caps, 5000, 50);
        assert_eq!(extent.width, 1000);
        assert_eq!(extent.height, 100);
    }

    #[test]
    fn vsync_always_selects_fifo() {
        let available = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            select_present_mode(&available, true),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn no_vsync_prefers_mailbox() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            select_present_mode(&available, false),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn srgb_format_preferred() {
        let available = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let selected = select_surface_format(&available);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
    }
}
