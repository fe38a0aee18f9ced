//! Per-frame context handed to render systems.

use crate::camera::Camera;
use ash::vk;
use lumen_scene::Scene;

/// Everything a render system needs for one frame.
///
/// Built fresh each iteration after `begin_frame` succeeds and dropped
/// before `end_frame`.
pub struct FrameContext<'a> {
    /// Frame slot index in `[0, MAX_FRAMES_IN_FLIGHT)`.
    pub frame_index: usize,
    /// Seconds since the previous frame, already capped.
    pub frame_time: f32,
    /// The command buffer being recorded.
    pub command_buffer: vk::CommandBuffer,
    /// Camera for this frame.
    pub camera: &'a Camera,
    /// The slot's global descriptor set (uniform buffer at binding 0).
    pub global_descriptor_set: vk::DescriptorSet,
    /// The scene to draw.
    pub scene: &'a Scene,
}
