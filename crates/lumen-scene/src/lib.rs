//! Scene representation for the Lumen renderer.
//!
//! A [`Scene`] is a flat collection of [`SceneObject`]s. Objects carry a
//! [`Transform`], a color, and optional mesh and point-light components.
//! No ECS; the renderer iterates the collection directly.

pub mod object;
pub mod scene;
pub mod transform;

pub use object::{MeshId, PointLight, SceneObject};
pub use scene::Scene;
pub use transform::Transform;
