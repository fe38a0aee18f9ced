//! Draws every scene object that has a mesh.

use crate::error::Result;
use crate::frame::FrameContext;
use crate::model::{MeshRegistry, Vertex};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use lumen_gpu::{GpuContext, GraphicsPipeline, GraphicsPipelineConfig};
use tracing::warn;

/// Per-draw push constants: object-to-world and normal matrices.
///
/// The normal matrix is padded out to a mat4 for std430 alignment.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct MeshPushConstants {
    model: Mat4,
    normal: Mat4,
}

/// Forward-renders lit, vertex-colored meshes.
pub struct GeometrySystem {
    pipeline: GraphicsPipeline,
}

impl GeometrySystem {
    /// Build the geometry pipeline against the swapchain's render pass.
    ///
    /// `vertex_spv` / `fragment_spv` are caller-provided SPIR-V words.
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
            .size(std::mem::size_of::<MeshPushConstants>() as u32);

        let config = GraphicsPipelineConfig {
            vertex_shader: vertex_spv,
            fragment_shader: fragment_spv,
            vertex_bindings: vec![Vertex::binding_description()],
            vertex_attributes: Vertex::attribute_descriptions(),
            render_pass,
            ..GraphicsPipelineConfig::default()
        };

        let pipeline = unsafe {
            GraphicsPipeline::new(gpu.device(), &config, &[global_set_layout], &[push_range])?
        };

        Ok(Self { pipeline })
    }

    /// Record draws for all meshes in the frame's scene.
    ///
    /// # Safety
    /// Must be recorded inside the swapchain render pass.
    pub unsafe fn render(&self, gpu: &GpuContext, frame: &FrameContext<'_>, meshes: &MeshRegistry) {
        let device = gpu.device();
        let cmd = frame.command_buffer;

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

        for object in frame.scene.meshes() {
            let Some(mesh_id) = object.mesh else { continue };
            let model = match meshes.get(mesh_id) {
                Ok(model) => model,
                Err(e) => {
                    warn!("skipping object {}: {e}", object.id().raw());
                    continue;
                }
            };

            let push = MeshPushConstants {
                model: object.transform.matrix(),
                normal: Mat4::from_mat3(object.transform.normal_matrix()),
            };
            unsafe {
                device.cmd_push_constants(
                    cmd,
                    self.pipeline.layout,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(&push),
                );

                model.bind(gpu, cmd);
                model.draw(gpu, cmd);
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
