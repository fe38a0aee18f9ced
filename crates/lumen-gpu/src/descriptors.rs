//! Descriptor set management.
//!
//! Layouts remember their bindings so a [`DescriptorWriter`] can validate
//! writes against them. Pools track a host-side set budget, which lets
//! exhaustion behave deterministically instead of depending on driver slack.

use crate::error::{GpuError, Result};
use ash::vk;
use std::collections::HashMap;

/// Stages a binding is visible to, given its descriptor type.
///
/// Uniform buffers are always made visible to both the vertex and fragment
/// stages so one global set layout works for every pipeline in the frame.
/// All other descriptor types keep the stages the caller asked for.
pub fn effective_stages(
    descriptor_type: vk::DescriptorType,
    requested: vk::ShaderStageFlags,
) -> vk::ShaderStageFlags {
    if descriptor_type == vk::DescriptorType::UNIFORM_BUFFER {
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    } else {
        requested
    }
}

/// A descriptor set layout together with its binding table.
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    bindings: HashMap<u32, vk::DescriptorSetLayoutBinding<'static>>,
}

impl DescriptorSetLayout {
    /// Get the raw layout handle.
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Look up a binding description.
    pub fn binding(&self, binding: u32) -> Option<&vk::DescriptorSetLayoutBinding<'static>> {
        self.bindings.get(&binding)
    }

    /// Number of bindings in this layout.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Destroy the layout.
    ///
    /// # Safety
    /// The device must be valid and the layout must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        unsafe { device.destroy_descriptor_set_layout(self.layout, None) };
        self.layout = vk::DescriptorSetLayout::null();
    }
}

/// Descriptor set layout builder.
pub struct DescriptorSetLayoutBuilder {
    bindings: HashMap<u32, vk::DescriptorSetLayoutBinding<'static>>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Add a binding.
    ///
    /// Panics if `binding` was already added; a layout with two descriptions
    /// for one slot is always a programming error.
    pub fn binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        count: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        assert!(
            !self.bindings.contains_key(&binding),
            "binding {binding} already in use"
        );
        self.bindings.insert(
            binding,
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(count)
                .stage_flags(effective_stages(descriptor_type, stage_flags)),
        );
        self
    }

    /// Add a uniform buffer binding.
    pub fn uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::UNIFORM_BUFFER, 1, stage_flags)
    }

    /// Add a storage buffer binding.
    pub fn storage_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::STORAGE_BUFFER, 1, stage_flags)
    }

    /// Add a sampled image binding.
    pub fn sampled_image(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            1,
            stage_flags,
        )
    }

    /// Bindings collected so far, in binding order.
    pub fn bindings(&self) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
        let mut out: Vec<_> = self.bindings.values().copied().collect();
        out.sort_by_key(|b| b.binding);
        out
    }

    /// Build the descriptor set layout.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn build(self, device: &ash::Device) -> Result<DescriptorSetLayout> {
        let bindings = self.bindings();
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }?;
        Ok(DescriptorSetLayout {
            layout,
            bindings: self.bindings,
        })
    }
}

impl Default for DescriptorSetLayoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-side counter for descriptor set capacity.
///
/// Mirrors the `max_sets` a pool was created with so allocation failure is
/// predictable rather than left to driver behavior.
#[derive(Debug, Clone, Copy)]
pub struct SetBudget {
    max_sets: u32,
    allocated: u32,
}

impl SetBudget {
    /// Budget for a pool of `max_sets`.
    pub fn new(max_sets: u32) -> Self {
        Self {
            max_sets,
            allocated: 0,
        }
    }

    /// Try to reserve `count` sets. Returns false without reserving anything
    /// if the budget cannot cover them.
    pub fn try_reserve(&mut self, count: u32) -> bool {
        if self.allocated + count > self.max_sets {
            return false;
        }
        self.allocated += count;
        true
    }

    /// Return `count` sets to the budget.
    pub fn release(&mut self, count: u32) {
        self.allocated = self.allocated.saturating_sub(count);
    }

    /// Reset the budget to empty.
    pub fn reset(&mut self) {
        self.allocated = 0;
    }

    /// Sets currently reserved.
    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    /// Sets still available.
    pub fn remaining(&self) -> u32 {
        self.max_sets - self.allocated
    }
}

/// Descriptor pool for allocating descriptor sets.
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    budget: SetBudget,
}

impl DescriptorPool {
    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Allocate one descriptor set, or `None` when the pool is exhausted.
    ///
    /// There is no overflow pool; callers size their pool for everything
    /// they allocate up front.
    ///
    /// # Safety
    /// The device and layout must be valid.
    pub unsafe fn allocate_descriptor(
        &mut self,
        device: &ash::Device,
        layout: &DescriptorSetLayout,
    ) -> Result<Option<vk::DescriptorSet>> {
        if !self.budget.try_reserve(1) {
            return Ok(None);
        }

        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        match unsafe { device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => Ok(Some(sets[0])),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                self.budget.release(1);
                Ok(None)
            }
            Err(e) => {
                self.budget.release(1);
                Err(GpuError::from(e))
            }
        }
    }

    /// Free descriptor sets back to the pool.
    ///
    /// # Safety
    /// The device must be valid and the sets must not be in use.
    pub unsafe fn free_descriptors(
        &mut self,
        device: &ash::Device,
        sets: &[vk::DescriptorSet],
    ) -> Result<()> {
        unsafe { device.free_descriptor_sets(self.pool, sets) }?;
        self.budget.release(sets.len() as u32);
        Ok(())
    }

    /// Reset the pool, freeing all descriptor sets.
    ///
    /// # Safety
    /// The device must be valid and no descriptor sets must be in use.
    pub unsafe fn reset(&mut self, device: &ash::Device) -> Result<()> {
        unsafe { device.reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty()) }?;
        self.budget.reset();
        Ok(())
    }

    /// Remaining set capacity.
    pub fn remaining_sets(&self) -> u32 {
        self.budget.remaining()
    }

    /// Destroy the pool.
    ///
    /// # Safety
    /// The device must be valid and the pool must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        unsafe { device.destroy_descriptor_pool(self.pool, None) };
        self.pool = vk::DescriptorPool::null();
    }
}

/// Builder for a descriptor pool.
pub struct DescriptorPoolBuilder {
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    max_sets: u32,
    flags: vk::DescriptorPoolCreateFlags,
}

impl DescriptorPoolBuilder {
    /// Create a new builder. Defaults to a capacity of 1000 sets.
    pub fn new() -> Self {
        Self {
            pool_sizes: Vec::new(),
            max_sets: 1000,
            flags: vk::DescriptorPoolCreateFlags::empty(),
        }
    }

    /// Declare capacity for `count` descriptors of the given type.
    pub fn pool_size(mut self, descriptor_type: vk::DescriptorType, count: u32) -> Self {
        self.pool_sizes.push(
            vk::DescriptorPoolSize::default()
                .ty(descriptor_type)
                .descriptor_count(count),
        );
        self
    }

    /// Set the maximum number of sets the pool can hand out.
    pub fn max_sets(mut self, count: u32) -> Self {
        self.max_sets = count;
        self
    }

    /// Set pool create flags.
    pub fn flags(mut self, flags: vk::DescriptorPoolCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Build the descriptor pool.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn build(self, device: &ash::Device) -> Result<DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(self.max_sets)
            .pool_sizes(&self.pool_sizes)
            .flags(self.flags);

        let pool = unsafe { device.create_descriptor_pool(&create_info, None) }?;
        Ok(DescriptorPool {
            pool,
            budget: SetBudget::new(self.max_sets),
        })
    }
}

impl Default for DescriptorPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates descriptor writes against one layout, then applies them.
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    writes: Vec<vk::WriteDescriptorSet<'a>>,
}

impl<'a> DescriptorWriter<'a> {
    /// Start a writer for the given layout.
    pub fn new(layout: &'a DescriptorSetLayout) -> Self {
        Self {
            layout,
            writes: Vec::new(),
        }
    }

    /// Queue a buffer write for `binding`.
    ///
    /// The buffer info must outlive the final `build`/`overwrite` call.
    /// Panics if the binding expects more than one descriptor; the writer
    /// only supplies single infos.
    pub fn write_buffer(
        mut self,
        binding: u32,
        buffer_info: &'a vk::DescriptorBufferInfo,
    ) -> Result<Self> {
        let description = self.layout.binding(binding).ok_or_else(|| {
            GpuError::InvalidState(format!("layout has no binding {binding}"))
        })?;
        assert!(
            description.descriptor_count == 1,
            "binding {binding} expects {} descriptors, writer provides one",
            description.descriptor_count
        );

        self.writes.push(
            vk::WriteDescriptorSet::default()
                .dst_binding(binding)
                .descriptor_type(description.descriptor_type)
                .buffer_info(std::slice::from_ref(buffer_info)),
        );
        Ok(self)
    }

    /// Queue an image write for `binding`.
    ///
    /// Panics if the binding expects more than one descriptor.
    pub fn write_image(
        mut self,
        binding: u32,
        image_info: &'a vk::DescriptorImageInfo,
    ) -> Result<Self> {
        let description = self.layout.binding(binding).ok_or_else(|| {
            GpuError::InvalidState(format!("layout has no binding {binding}"))
        })?;
        assert!(
            description.descriptor_count == 1,
            "binding {binding} expects {} descriptors, writer provides one",
            description.descriptor_count
        );

        self.writes.push(
            vk::WriteDescriptorSet::default()
                .dst_binding(binding)
                .descriptor_type(description.descriptor_type)
                .image_info(std::slice::from_ref(image_info)),
        );
        Ok(self)
    }

    /// Allocate a set from `pool` and apply the queued writes to it.
    ///
    /// Returns `None` when the pool is exhausted.
    ///
    /// # Safety
    /// The device and pool must be valid.
    pub unsafe fn build(
        self,
        device: &ash::Device,
        pool: &mut DescriptorPool,
    ) -> Result<Option<vk::DescriptorSet>> {
        let Some(set) = (unsafe { pool.allocate_descriptor(device, self.layout) }?) else {
            return Ok(None);
        };
        unsafe { self.overwrite(device, set) };
        Ok(Some(set))
    }

    /// Apply the queued writes to an existing set.
    ///
    /// # Safety
    /// The device and set must be valid.
    pub unsafe fn overwrite(mut self, device: &ash::Device, set: vk::DescriptorSet) {
        for write in &mut self.writes {
            write.dst_set = set;
        }
        unsafe { device.update_descriptor_sets(&self.writes, &[]) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_buffers_are_visible_to_vertex_and_fragment() {
        let stages = effective_stages(
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::ShaderStageFlags::COMPUTE,
        );
        assert_eq!(
            stages,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn other_types_keep_requested_stages() {
        let stages = effective_stages(
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
        );
        assert_eq!(stages, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    #[should_panic(expected = "binding 0 already in use")]
    fn duplicate_binding_panics() {
        let _ = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .storage_buffer(0, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn builder_orders_bindings() {
        let builder = DescriptorSetLayoutBuilder::new()
            .sampled_image(2, vk::ShaderStageFlags::FRAGMENT)
            .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .storage_buffer(1, vk::ShaderStageFlags::FRAGMENT);

        let bindings = builder.bindings();
        let numbers: Vec<u32> = bindings.iter().map(|b| b.binding).collect();
        assert_eq!(numbers, [0, 1, 2]);
    }

    #[test]
    fn budget_exhaustion_and_release() {
        let mut budget = SetBudget::new(2);
        assert!(budget.try_reserve(1));
        assert!(budget.try_reserve(1));
        assert!(!budget.try_reserve(1));
        assert_eq!(budget.remaining(), 0);

        budget.release(1);
        assert!(budget.try_reserve(1));

        budget.reset();
        assert_eq!(budget.allocated(), 0);
        assert_eq!(budget.remaining(), 2);
    }

    #[test]
    fn budget_rejects_oversized_reservation_without_partial_reserve() {
        let mut budget = SetBudget::new(3);
        assert!(!budget.try_reserve(4));
        assert_eq!(budget.allocated(), 0);
        assert!(budget.try_reserve(3));
    }

    // The writer never talks to the device before `build`, so validation
    // is testable against a layout assembled by hand.
    fn unbuilt_layout(builder: DescriptorSetLayoutBuilder) -> DescriptorSetLayout {
        DescriptorSetLayout {
            layout: vk::DescriptorSetLayout::null(),
            bindings: builder.bindings,
        }
    }

    #[test]
    fn writer_accepts_single_descriptor_binding() {
        let layout = unbuilt_layout(
            DescriptorSetLayoutBuilder::new().uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
        );
        let info = vk::DescriptorBufferInfo::default();
        assert!(DescriptorWriter::new(&layout).write_buffer(0, &info).is_ok());
    }

    #[test]
    fn writer_rejects_unknown_binding() {
        let layout = unbuilt_layout(
            DescriptorSetLayoutBuilder::new().uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
        );
        let info = vk::DescriptorBufferInfo::default();
        assert!(DescriptorWriter::new(&layout).write_buffer(1, &info).is_err());
    }

    #[test]
    #[should_panic(expected = "binding 0 expects 4 descriptors")]
    fn writer_rejects_multi_descriptor_binding() {
        let layout = unbuilt_layout(DescriptorSetLayoutBuilder::new().binding(
            0,
            vk::DescriptorType::UNIFORM_BUFFER,
            4,
            vk::ShaderStageFlags::VERTEX,
        ));
        let info = vk::DescriptorBufferInfo::default();
        let _ = DescriptorWriter::new(&layout).write_buffer(0, &info);
    }
}
