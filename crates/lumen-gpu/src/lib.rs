//! Vulkan abstraction layer for the Lumen renderer.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - GPU capability detection
//! - Memory allocation via gpu-allocator
//! - Host-visible per-frame uniform buffers
//! - Descriptor set layouts, pools, and writers
//! - Command buffer management
//! - Swapchain handling with frame synchronization

pub mod buffer;
pub mod capabilities;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use buffer::{align_to, DeviceBuffer};
pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{
    DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorWriter, SetBudget,
};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer, GpuImage};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::{SurfaceStatus, Swapchain, MAX_FRAMES_IN_FLIGHT};
pub use sync::{create_fence, create_semaphore, FrameSync};
