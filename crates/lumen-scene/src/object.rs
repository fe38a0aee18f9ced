//! Scene objects and their components.

use crate::transform::Transform;
use glam::Vec3;
use lumen_core::ObjectId;

/// Handle to a mesh registered with the renderer.
///
/// The scene stays free of GPU types; the renderer resolves handles
/// against its own mesh registry at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

/// Point light component. Position and radius come from the owning
/// object's transform (translation and x-scale respectively).
#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    pub intensity: f32,
}

/// An object in the scene.
pub struct SceneObject {
    id: ObjectId,
    pub transform: Transform,
    pub color: Vec3,
    pub mesh: Option<MeshId>,
    pub point_light: Option<PointLight>,
}

impl SceneObject {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self {
            id,
            transform: Transform::default(),
            color: Vec3::ONE,
            mesh: None,
            point_light: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The light's world-space radius, taken from the transform's x-scale.
    pub fn light_radius(&self) -> f32 {
        self.transform.scale().x
    }
}
