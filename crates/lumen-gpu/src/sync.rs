//! Synchronization primitives.

use crate::error::Result;
use ash::vk;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = unsafe { device.create_semaphore(&create_info, None) }?;
    Ok(semaphore)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = unsafe { device.create_fence(&create_info, None) }?;
    Ok(fence)
}

/// Wait for a fence to be signaled.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(
    device: &ash::Device,
    fence: vk::Fence,
    timeout_ns: u64,
) -> Result<()> {
    unsafe { device.wait_for_fences(&[fence], true, timeout_ns) }?;
    Ok(())
}

/// Reset a fence to unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    unsafe { device.reset_fences(&[fence]) }?;
    Ok(())
}

/// Per-slot frame synchronization resources.
pub struct FrameSync {
    /// Semaphore signaled when the swapchain image is available
    pub image_available: vk::Semaphore,
    /// Semaphore signaled when rendering is complete
    pub render_finished: vk::Semaphore,
    /// Fence signaled when the slot's previous submission retires
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create frame synchronization resources.
    ///
    /// The fence starts signaled so the first frame does not block.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        unsafe {
            Ok(Self {
                image_available: create_semaphore(device)?,
                render_finished: create_semaphore(device)?,
                in_flight: create_fence(device, true)?,
            })
        }
    }

    /// Block until this slot's previous submission retires.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &ash::Device) -> Result<()> {
        unsafe { wait_for_fence(device, self.in_flight, u64::MAX) }
    }

    /// Reset the fence before resubmitting the slot.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        unsafe { reset_fence(device, self.in_flight) }
    }

    /// Destroy synchronization resources.
    ///
    /// # Safety
    /// The device must be valid and resources must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight, None);
        }
    }
}
