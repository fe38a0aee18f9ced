//! Frame orchestration and rendering on top of `lumen-gpu`.
//!
//! The centerpiece is [`FrameScheduler`], a state machine that drives
//! acquire/record/present for each frame slot and handles swapchain
//! recreation on resize or stale surfaces. It is generic over three seams
//! ([`PresentationEngine`], [`WindowTarget`], [`CommandRecorder`]) so the
//! frame logic is testable without a device; [`VulkanScheduler`] is the
//! production instantiation.

pub mod backend;
pub mod camera;
pub mod error;
pub mod frame;
pub mod model;
pub mod scheduler;
pub mod systems;
pub mod ubo;
pub mod vulkan;

pub use backend::{CommandRecorder, PresentationEngine, WindowTarget};
pub use camera::Camera;
pub use error::{RenderError, Result};
pub use frame::FrameContext;
pub use model::{MeshData, MeshRegistry, Model, Vertex};
pub use scheduler::FrameScheduler;
pub use systems::{GeometrySystem, PointLightSystem};
pub use ubo::{GlobalUbo, PointLightData, MAX_LIGHTS};
pub use vulkan::{destroy_scheduler, VulkanPresentation, VulkanRecorder, VulkanScheduler};
