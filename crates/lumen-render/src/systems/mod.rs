//! Render systems, executed in a fixed order each frame.

pub mod geometry;
pub mod point_light;

pub use geometry::GeometrySystem;
pub use point_light::PointLightSystem;
