//! The scene container.

use crate::object::{MeshId, PointLight, SceneObject};
use glam::Vec3;
use hashbrown::HashMap;
use lumen_core::{IdAllocator, ObjectId};

/// Flat collection of scene objects keyed by id.
///
/// Owns the [`IdAllocator`] that mints object ids, so ids are unique within
/// one scene and nothing here is process-global.
#[derive(Default)]
pub struct Scene {
    ids: IdAllocator,
    objects: HashMap<ObjectId, SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty object and return a mutable handle for setup.
    pub fn spawn(&mut self) -> &mut SceneObject {
        let id = self.ids.next();
        self.objects.entry(id).insert(SceneObject::new(id)).into_mut()
    }

    /// Create an object rendered with the given mesh.
    pub fn spawn_mesh(&mut self, mesh: MeshId) -> &mut SceneObject {
        let object = self.spawn();
        object.mesh = Some(mesh);
        object
    }

    /// Create a point light with the given intensity, radius, and color.
    pub fn spawn_point_light(
        &mut self,
        intensity: f32,
        radius: f32,
        color: Vec3,
    ) -> &mut SceneObject {
        let object = self.spawn();
        object.color = color;
        object.transform.set_uniform_scale(radius);
        object.point_light = Some(PointLight { intensity });
        object
    }

    /// Remove an object. Returns it if it existed.
    pub fn despawn(&mut self, id: ObjectId) -> Option<SceneObject> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SceneObject> {
        self.objects.values_mut()
    }

    /// Objects that have a mesh to draw.
    pub fn meshes(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values().filter(|o| o.mesh.is_some())
    }

    /// Objects that carry a point light.
    pub fn point_lights(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values().filter(|o| o.point_light.is_some())
    }

    /// Mutable iteration over point lights, for animation.
    pub fn point_lights_mut(&mut self) -> impl Iterator<Item = &mut SceneObject> {
        self.objects.values_mut().filter(|o| o.point_light.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawned_objects_get_unique_ids() {
        let mut scene = Scene::new();
        let a = scene.spawn().id();
        let b = scene.spawn().id();
        assert_ne!(a, b);
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn despawn_removes_object() {
        let mut scene = Scene::new();
        let id = scene.spawn().id();
        assert!(scene.despawn(id).is_some());
        assert!(scene.get(id).is_none());
        assert!(scene.despawn(id).is_none());
    }

    #[test]
    fn component_filters() {
        let mut scene = Scene::new();
        scene.spawn_mesh(MeshId(0));
        scene.spawn_point_light(1.0, 0.1, Vec3::ONE);
        scene.spawn();

        assert_eq!(scene.meshes().count(), 1);
        assert_eq!(scene.point_lights().count(), 1);
        assert_eq!(scene.len(), 3);
    }

    #[test]
    fn point_light_radius_from_scale() {
        let mut scene = Scene::new();
        let light = scene.spawn_point_light(2.0, 0.5, Vec3::X);
        assert_eq!(light.light_radius(), 0.5);
        assert_eq!(light.point_light.unwrap().intensity, 2.0);
    }
}
