//! GPU meshes and the registry that owns them.

use crate::error::{RenderError, Result};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use gpu_allocator::MemoryLocation;
use hashbrown::HashMap;
use lumen_gpu::command::execute_single_time_commands;
use lumen_gpu::memory::GpuBuffer;
use lumen_gpu::{CommandPool, DeviceBuffer, GpuContext};
use lumen_scene::MeshId;
use std::mem::offset_of;

/// Vertex layout shared by all mesh pipelines.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
    pub normal: Vec3,
}

impl Vertex {
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription::default()
                .location(0)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Self, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .location(1)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Self, color) as u32),
            vk::VertexInputAttributeDescription::default()
                .location(2)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Self, normal) as u32),
        ]
    }
}

/// CPU-side mesh data before upload.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// A mesh resident in device-local memory.
pub struct Model {
    vertex_buffer: GpuBuffer,
    vertex_count: u32,
    index_buffer: Option<GpuBuffer>,
    index_count: u32,
}

impl Model {
    /// Upload mesh data through a staging buffer.
    ///
    /// Vertex (and index, when present) buffers land in device-local
    /// memory; the copy runs as a one-time submission on the graphics
    /// queue and blocks until complete.
    pub fn new(gpu: &GpuContext, upload_pool: &CommandPool, data: &MeshData) -> Result<Self> {
        assert!(data.vertices.len() >= 3, "mesh needs at least 3 vertices");

        let vertex_buffer = upload_via_staging(
            gpu,
            upload_pool,
            bytemuck::cast_slice(&data.vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            "mesh vertices",
        )?;

        let index_buffer = if data.indices.is_empty() {
            None
        } else {
            Some(upload_via_staging(
                gpu,
                upload_pool,
                bytemuck::cast_slice(&data.indices),
                vk::BufferUsageFlags::INDEX_BUFFER,
                "mesh indices",
            )?)
        };

        Ok(Self {
            vertex_buffer,
            vertex_count: data.vertices.len() as u32,
            index_buffer,
            index_count: data.indices.len() as u32,
        })
    }

    /// Bind vertex (and index) buffers.
    ///
    /// # Safety
    /// The command buffer must be in the recording state.
    pub unsafe fn bind(&self, gpu: &GpuContext, cmd: vk::CommandBuffer) {
        let device = gpu.device();
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
            if let Some(index_buffer) = &self.index_buffer {
                device.cmd_bind_index_buffer(cmd, index_buffer.buffer, 0, vk::IndexType::UINT32);
            }
        }
    }

    /// Issue the draw call.
    ///
    /// # Safety
    /// [`Model::bind`] must have been recorded first.
    pub unsafe fn draw(&self, gpu: &GpuContext, cmd: vk::CommandBuffer) {
        let device = gpu.device();
        unsafe {
            if self.index_buffer.is_some() {
                device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
            } else {
                device.cmd_draw(cmd, self.vertex_count, 1, 0, 0);
            }
        }
    }

    /// Free the device buffers.
    ///
    /// # Safety
    /// The mesh must not be referenced by any in-flight frame.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        let mut allocator = gpu.allocator().lock();
        if let Err(e) = allocator.free_buffer(&mut self.vertex_buffer) {
            tracing::warn!("failed to free vertex buffer: {e}");
        }
        if let Some(index_buffer) = &mut self.index_buffer {
            if let Err(e) = allocator.free_buffer(index_buffer) {
                tracing::warn!("failed to free index buffer: {e}");
            }
        }
    }
}

/// Copy `bytes` into a fresh device-local buffer through a staging buffer.
fn upload_via_staging(
    gpu: &GpuContext,
    upload_pool: &CommandPool,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
    name: &str,
) -> Result<GpuBuffer> {
    let size = bytes.len() as u64;

    let mut staging = DeviceBuffer::new(
        gpu,
        size,
        1,
        vk::BufferUsageFlags::TRANSFER_SRC,
        1,
        "staging",
    )?;
    staging.map()?;
    staging.write_to_buffer(bytes, vk::WHOLE_SIZE, 0)?;

    let device_buffer = gpu.allocator().lock().create_buffer(
        size,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        MemoryLocation::GpuOnly,
        name,
    )?;

    unsafe {
        let staging_handle = staging.handle();
        let dst_handle = device_buffer.buffer;
        execute_single_time_commands(gpu.device(), upload_pool, gpu.graphics_queue(), |cmd| {
            let region = vk::BufferCopy::default().size(size);
            gpu.device()
                .cmd_copy_buffer(cmd, staging_handle, dst_handle, &[region]);
        })?;

        staging.destroy(gpu);
    }

    Ok(device_buffer)
}

/// Owns every uploaded mesh and maps [`MeshId`]s to them.
pub struct MeshRegistry {
    meshes: HashMap<MeshId, Model>,
    upload_pool: CommandPool,
    next_id: u32,
}

impl MeshRegistry {
    /// Create the registry and its transient upload pool.
    pub fn new(gpu: &GpuContext) -> Result<Self> {
        let upload_pool = unsafe {
            CommandPool::new(
                gpu.device(),
                gpu.graphics_queue_family(),
                vk::CommandPoolCreateFlags::TRANSIENT,
            )?
        };
        Ok(Self {
            meshes: HashMap::new(),
            upload_pool,
            next_id: 0,
        })
    }

    /// Upload a mesh and return its handle.
    pub fn register(&mut self, gpu: &GpuContext, data: &MeshData) -> Result<MeshId> {
        let model = Model::new(gpu, &self.upload_pool, data)?;
        let id = MeshId(self.next_id);
        self.next_id += 1;
        self.meshes.insert(id, model);
        Ok(id)
    }

    /// Look up a mesh.
    pub fn get(&self, id: MeshId) -> Result<&Model> {
        self.meshes.get(&id).ok_or(RenderError::MeshNotFound(id.0))
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Free all meshes and the upload pool.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        for (_, mut model) in self.meshes.drain() {
            unsafe { model.destroy(gpu) };
        }
        unsafe { self.upload_pool.destroy(gpu.device()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_shader_locations() {
        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[2].offset, 24);
        assert_eq!(Vertex::binding_description().stride, 36);
    }
}
