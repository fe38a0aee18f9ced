//! Animates point lights and draws them as camera-facing billboards.

use crate::error::Result;
use crate::frame::FrameContext;
use crate::ubo::{GlobalUbo, MAX_LIGHTS};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3, Vec4};
use lumen_gpu::{GpuContext, GraphicsPipeline, GraphicsPipelineConfig};
use lumen_scene::Scene;

/// Per-light push constants for the billboard shader.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct LightPushConstants {
    position: Vec4,
    color: Vec4,
    radius: f32,
    _padding: [f32; 3],
}

/// Orbit the light ring and write every light into the UBO's array.
///
/// Device-free so it is testable without a pipeline; one radian per second
/// around the world's up axis (Y down).
fn orbit_and_fill(scene: &mut Scene, dt: f32, ubo: &mut GlobalUbo) {
    let orbit = Quat::from_axis_angle(Vec3::new(0.0, -1.0, 0.0), dt);

    let mut count = 0usize;
    for object in scene.point_lights_mut() {
        let Some(light) = object.point_light else { continue };
        assert!(count < MAX_LIGHTS, "too many point lights in scene");

        let position = orbit * object.transform.translation();
        object.transform.set_translation(position);

        ubo.point_lights[count].position = position.extend(1.0);
        ubo.point_lights[count].color = object.color.extend(light.intensity);
        count += 1;
    }
    ubo.num_lights = count as u32;
}

/// Fills the UBO's light array and renders light billboards.
pub struct PointLightSystem {
    pipeline: GraphicsPipeline,
}

impl PointLightSystem {
    /// Build the billboard pipeline. No vertex input; the quad corners are
    /// generated in the vertex shader. Alpha blending on, depth write off,
    /// which is why lights draw after geometry.
    pub fn new(
        gpu: &GpuContext,
        render_pass: vk::RenderPass,
        global_set_layout: vk::DescriptorSetLayout,
        vertex_spv: Vec<u32>,
        fragment_spv: Vec<u32>,
    ) -> Result<Self> {
        let push_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(std::mem::size_of::<LightPushConstants>() as u32);

        let config = GraphicsPipelineConfig {
            vertex_shader: vertex_spv,
            fragment_shader: fragment_spv,
            alpha_blending: true,
            depth_write: false,
            render_pass,
            ..GraphicsPipelineConfig::default()
        };

        let pipeline = unsafe {
            GraphicsPipeline::new(gpu.device(), &config, &[global_set_layout], &[push_range])?
        };

        Ok(Self { pipeline })
    }

    /// Rotate the light ring and fill the UBO's light array.
    ///
    /// Panics if the scene carries more lights than the UBO can hold.
    pub fn update(&self, scene: &mut Scene, dt: f32, ubo: &mut GlobalUbo) {
        orbit_and_fill(scene, dt, ubo);
    }

    /// Record one billboard draw per light, back to front.
    ///
    /// # Safety
    /// Must be recorded inside the swapchain render pass, after opaque
    /// geometry.
    pub unsafe fn render(&self, gpu: &GpuContext, frame: &FrameContext<'_>) {
        let device = gpu.device();
        let cmd = frame.command_buffer;

        // Sort by distance to the camera so alpha blending layers correctly
        let camera_position = frame.camera.position();
        let mut lights: Vec<_> = frame
            .scene
            .point_lights()
            .filter_map(|object| {
                let light = object.point_light?;
                let position = object.transform.translation();
                Some((
                    camera_position.distance_squared(position),
                    position,
                    object.color.extend(light.intensity),
                    object.light_radius(),
                ))
            })
            .collect();
        lights.sort_by(|a, b| b.0.total_cmp(&a.0));

        unsafe {
            self.pipeline.bind(device, cmd);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout,
                0,
                &[frame.global_descriptor_set],
                &[],
            );
        }

        for (_, position, color, radius) in lights {
            let push = LightPushConstants {
                position: position.extend(1.0),
                color,
                radius,
                _padding: [0.0; 3],
            };
            unsafe {
                device.cmd_push_constants(
                    cmd,
                    self.pipeline.layout,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(&push),
                );
                device.cmd_draw(cmd, 6, 1, 0, 0);
            }
        }
    }

    /// Destroy the pipeline.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        unsafe { self.pipeline.destroy(gpu.device()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn light_array_carries_intensity_in_alpha() {
        let mut scene = Scene::new();
        scene.spawn_point_light(1.5, 0.1, Vec3::new(1.0, 0.0, 0.0));
        scene.spawn_point_light(0.5, 0.2, Vec3::new(0.0, 1.0, 0.0));
        let mut ubo = GlobalUbo::default();
        orbit_and_fill(&mut scene, 0.0, &mut ubo);

        assert_eq!(ubo.num_lights, 2);
        let intensities: Vec<f32> = ubo.point_lights[..2].iter().map(|l| l.color.w).collect();
        let mut sorted = intensities.clone();
        sorted.sort_by(f32::total_cmp);
        assert_eq!(sorted, [0.5, 1.5]);
    }

    #[test]
    fn zero_dt_leaves_positions_unchanged() {
        let mut scene = Scene::new();
        let light = scene.spawn_point_light(1.0, 0.1, Vec3::ONE);
        light.transform.set_translation(Vec3::new(2.0, -1.0, 0.0));
        let mut ubo = GlobalUbo::default();

        orbit_and_fill(&mut scene, 0.0, &mut ubo);

        let position = ubo.point_lights[0].position;
        assert_relative_eq!(position.x, 2.0, epsilon = 1e-6);
        assert_relative_eq!(position.y, -1.0, epsilon = 1e-6);
        assert_relative_eq!(position.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn orbit_preserves_distance_from_axis() {
        let mut scene = Scene::new();
        let light = scene.spawn_point_light(1.0, 0.1, Vec3::ONE);
        light.transform.set_translation(Vec3::new(3.0, -1.0, 0.0));
        let mut ubo = GlobalUbo::default();

        orbit_and_fill(&mut scene, 0.7, &mut ubo);

        let p = ubo.point_lights[0].position;
        let radial = (p.x * p.x + p.z * p.z).sqrt();
        assert_relative_eq!(radial, 3.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, -1.0, epsilon = 1e-6);
    }
}
