//! Host-visible buffers with per-instance alignment.
//!
//! A [`DeviceBuffer`] holds `instance_count` equally sized instances, each
//! padded to the alignment the device requires for dynamic uniform offsets.
//! The backing memory is persistently mapped by the allocator, so "mapping"
//! here only validates state; writes go straight through the mapped pointer.

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::memory::GpuBuffer;
use ash::vk;
use gpu_allocator::MemoryLocation;

/// Round `size` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two (Vulkan guarantees this for all
/// alignment limits). An alignment of zero means no padding.
pub fn align_to(size: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    if alignment > 0 {
        (size + alignment - 1) & !(alignment - 1)
    } else {
        size
    }
}

/// Copy `data` into `region`, honoring the whole-size sentinel.
///
/// With `size == vk::WHOLE_SIZE` the copy starts at the beginning of the
/// region and covers `data` entirely. Otherwise exactly `size` bytes of
/// `data` land at `offset`. Returns the byte range written.
pub fn copy_into_region(
    region: &mut [u8],
    data: &[u8],
    size: vk::DeviceSize,
    offset: vk::DeviceSize,
) -> Result<std::ops::Range<usize>> {
    let (start, len) = if size == vk::WHOLE_SIZE {
        (0usize, data.len())
    } else {
        (offset as usize, size as usize)
    };

    if len > data.len() {
        return Err(GpuError::InvalidState(format!(
            "write of {len} bytes exceeds source data of {} bytes",
            data.len()
        )));
    }
    let end = start
        .checked_add(len)
        .filter(|&e| e <= region.len())
        .ok_or_else(|| {
            GpuError::InvalidState(format!(
                "write of {len} bytes at offset {start} exceeds buffer of {} bytes",
                region.len()
            ))
        })?;

    region[start..end].copy_from_slice(&data[..len]);
    Ok(start..end)
}

/// A host-visible buffer sliced into aligned instances.
pub struct DeviceBuffer {
    inner: GpuBuffer,
    mapped: bool,
    instance_size: vk::DeviceSize,
    instance_count: u64,
    alignment_size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
}

impl DeviceBuffer {
    /// Create a buffer holding `instance_count` instances of `instance_size`
    /// bytes, each padded to `min_offset_alignment`.
    ///
    /// Pass the device's `min_uniform_buffer_offset_alignment` when the
    /// buffer will be bound with dynamic offsets, or `1` when a single
    /// instance is bound whole.
    pub fn new(
        gpu: &GpuContext,
        instance_size: vk::DeviceSize,
        instance_count: u64,
        usage: vk::BufferUsageFlags,
        min_offset_alignment: vk::DeviceSize,
        name: &str,
    ) -> Result<Self> {
        let alignment_size = align_to(instance_size, min_offset_alignment);
        let buffer_size = alignment_size * instance_count;

        let inner = gpu.allocator().lock().create_buffer(
            buffer_size,
            usage,
            MemoryLocation::CpuToGpu,
            name,
        )?;

        Ok(Self {
            inner,
            mapped: false,
            instance_size,
            instance_count,
            alignment_size,
            usage,
        })
    }

    /// Mark the buffer mapped for writing.
    ///
    /// The allocator maps CpuToGpu memory persistently, so this only checks
    /// that a mapped pointer actually exists.
    pub fn map(&mut self) -> Result<()> {
        if self.inner.mapped_ptr().is_none() {
            return Err(GpuError::InvalidState(
                "buffer memory is not host-visible".to_string(),
            ));
        }
        self.mapped = true;
        Ok(())
    }

    /// Mark the buffer unmapped. Idempotent; further writes panic.
    pub fn unmap(&mut self) {
        self.mapped = false;
    }

    /// Whether the buffer is currently mapped for writing.
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Write `size` bytes of `data` at `offset`, or all of `data` at the
    /// start of the buffer when `size` is `vk::WHOLE_SIZE`.
    ///
    /// Writing to an unmapped buffer is a programming error and panics.
    pub fn write_to_buffer(
        &mut self,
        data: &[u8],
        size: vk::DeviceSize,
        offset: vk::DeviceSize,
    ) -> Result<()> {
        assert!(self.mapped, "cannot write to unmapped buffer");
        let ptr = self
            .inner
            .mapped_ptr()
            .ok_or_else(|| GpuError::InvalidState("buffer not mapped".to_string()))?;

        let region =
            unsafe { std::slice::from_raw_parts_mut(ptr, self.inner.size as usize) };
        copy_into_region(region, data, size, offset)?;
        Ok(())
    }

    /// Write one instance worth of `data` into slot `index`.
    pub fn write_to_index(&mut self, data: &[u8], index: u64) -> Result<()> {
        let offset = self.offset_of_index(index)?;
        self.write_to_buffer(data, self.instance_size, offset)
    }

    /// Flush a range of host writes so the device sees them.
    ///
    /// Required for non-coherent memory; harmless on coherent memory.
    pub fn flush(&self, gpu: &GpuContext, size: vk::DeviceSize, offset: vk::DeviceSize) -> Result<()> {
        let memory = self
            .inner
            .memory()
            .ok_or_else(|| GpuError::InvalidState("buffer has no allocation".to_string()))?;
        let range = vk::MappedMemoryRange::default()
            .memory(memory)
            .offset(self.inner.memory_offset() + offset)
            .size(size);
        unsafe {
            gpu.device().flush_mapped_memory_ranges(&[range])?;
        }
        Ok(())
    }

    /// Flush the slot at `index`.
    pub fn flush_index(&self, gpu: &GpuContext, index: u64) -> Result<()> {
        let offset = self.offset_of_index(index)?;
        self.flush(gpu, self.alignment_size, offset)
    }

    /// Invalidate the slot at `index`.
    pub fn invalidate_index(&self, gpu: &GpuContext, index: u64) -> Result<()> {
        let offset = self.offset_of_index(index)?;
        self.invalidate(gpu, self.alignment_size, offset)
    }

    /// Invalidate a range so the host sees device writes.
    pub fn invalidate(
        &self,
        gpu: &GpuContext,
        size: vk::DeviceSize,
        offset: vk::DeviceSize,
    ) -> Result<()> {
        let memory = self
            .inner
            .memory()
            .ok_or_else(|| GpuError::InvalidState("buffer has no allocation".to_string()))?;
        let range = vk::MappedMemoryRange::default()
            .memory(memory)
            .offset(self.inner.memory_offset() + offset)
            .size(size);
        unsafe {
            gpu.device().invalidate_mapped_memory_ranges(&[range])?;
        }
        Ok(())
    }

    /// Descriptor info covering `size` bytes at `offset`.
    pub fn descriptor_info(
        &self,
        size: vk::DeviceSize,
        offset: vk::DeviceSize,
    ) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo::default()
            .buffer(self.inner.buffer)
            .offset(offset)
            .range(size)
    }

    /// Descriptor info covering the slot at `index`.
    pub fn descriptor_info_for_index(&self, index: u64) -> Result<vk::DescriptorBufferInfo> {
        let offset = self.offset_of_index(index)?;
        Ok(self.descriptor_info(self.instance_size, offset))
    }

    /// Byte offset of the slot at `index`.
    pub fn offset_of_index(&self, index: u64) -> Result<vk::DeviceSize> {
        if index >= self.instance_count {
            return Err(GpuError::InvalidState(format!(
                "instance index {index} out of range ({} instances)",
                self.instance_count
            )));
        }
        Ok(index * self.alignment_size)
    }

    /// Raw Vulkan buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.inner.buffer
    }

    /// Unpadded size of one instance.
    pub fn instance_size(&self) -> vk::DeviceSize {
        self.instance_size
    }

    /// Number of instances.
    pub fn instance_count(&self) -> u64 {
        self.instance_count
    }

    /// Padded per-instance stride.
    pub fn alignment_size(&self) -> vk::DeviceSize {
        self.alignment_size
    }

    /// Total buffer size in bytes.
    pub fn buffer_size(&self) -> vk::DeviceSize {
        self.inner.size
    }

    /// Usage flags the buffer was created with.
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    /// Release the buffer and its memory.
    ///
    /// # Safety
    /// The buffer must no longer be in use by the device.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        self.unmap();
        if let Err(e) = gpu.allocator().lock().free_buffer(&mut self.inner) {
            tracing::warn!("failed to free buffer: {e}");
        }
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        // The allocation itself is reclaimed through destroy(); dropping only
        // guarantees the mapped state is released.
        self.unmap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_rounds_up_to_power_of_two() {
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(100, 64), 128);
    }

    #[test]
    fn align_to_zero_alignment_is_identity() {
        assert_eq!(align_to(100, 0), 100);
        assert_eq!(align_to(0, 0), 0);
    }

    #[test]
    fn align_to_one_is_identity() {
        assert_eq!(align_to(100, 1), 100);
        assert_eq!(align_to(7, 1), 7);
    }

    #[test]
    fn whole_size_write_starts_at_zero() {
        let mut region = vec![0u8; 16];
        let data = [1u8, 2, 3, 4];
        let range = copy_into_region(&mut region, &data, vk::WHOLE_SIZE, 8).unwrap();
        // Sentinel ignores the offset argument
        assert_eq!(range, 0..4);
        assert_eq!(&region[..4], &data);
        assert_eq!(&region[4..], &[0u8; 12]);
    }

    #[test]
    fn sized_write_lands_at_offset() {
        let mut region = vec![0u8; 16];
        let data = [9u8, 8, 7, 6];
        let range = copy_into_region(&mut region, &data, 4, 8).unwrap();
        assert_eq!(range, 8..12);
        assert_eq!(&region[8..12], &data);
        assert_eq!(&region[..8], &[0u8; 8]);
    }

    #[test]
    fn write_past_end_is_rejected() {
        let mut region = vec![0u8; 8];
        let data = [0u8; 8];
        assert!(copy_into_region(&mut region, &data, 8, 4).is_err());
        // And the region is untouched
        assert_eq!(region, [0u8; 8]);
    }

    #[test]
    fn write_larger_than_source_is_rejected() {
        let mut region = vec![0u8; 64];
        let data = [0u8; 4];
        assert!(copy_into_region(&mut region, &data, 8, 0).is_err());
    }
}
