//! Per-frame global uniform data.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Maximum number of point lights the global UBO can carry.
pub const MAX_LIGHTS: usize = 10;

/// One point light as the shaders see it.
///
/// `position.w` is unused padding; `color.w` carries the intensity.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct PointLightData {
    pub position: Vec4,
    pub color: Vec4,
}

/// Global uniform buffer contents, written once per frame slot.
///
/// Field order is part of the shader interface; std140 layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GlobalUbo {
    pub projection: Mat4,
    pub view: Mat4,
    pub inverse_view: Mat4,
    /// RGB ambient color, w = ambient intensity.
    pub ambient_light_color: Vec4,
    pub point_lights: [PointLightData; MAX_LIGHTS],
    pub num_lights: u32,
    pub _padding: [u32; 3],
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
            ambient_light_color: Vec4::new(1.0, 1.0, 1.0, 0.02),
            point_lights: [PointLightData::default(); MAX_LIGHTS],
            num_lights: 0,
            _padding: [0; 3],
        }
    }
}

impl GlobalUbo {
    /// Size in bytes, for sizing the per-slot uniform buffers.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_has_no_implicit_padding() {
        // 3 mat4 + 1 vec4 + MAX_LIGHTS * 2 vec4 + vec4 of u32
        let expected = 3 * 64 + 16 + MAX_LIGHTS * 32 + 16;
        assert_eq!(std::mem::size_of::<GlobalUbo>(), expected);
    }
}
