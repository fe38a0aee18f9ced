//! Object transforms with cached matrices.

use glam::{Mat3, Mat4, Quat, Vec3};
use std::cell::Cell;

/// Translation, rotation, and scale with lazily recomputed matrices.
///
/// The cache invalidation is internal: mutators mark the cache dirty and
/// [`Transform::matrix`] / [`Transform::normal_matrix`] are the only read
/// paths for derived data.
#[derive(Debug, Clone)]
pub struct Transform {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,

    dirty: Cell<bool>,
    cached_matrix: Cell<Mat4>,
    cached_normal: Cell<Mat3>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            dirty: Cell::new(true),
            cached_matrix: Cell::new(Mat4::IDENTITY),
            cached_normal: Cell::new(Mat3::IDENTITY),
        }
    }
}

impl Transform {
    /// Transform at `translation` with identity rotation and unit scale.
    pub fn at(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
        self.dirty.set(true);
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.dirty.set(true);
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty.set(true);
    }

    /// Uniform scale on all three axes.
    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.set_scale(Vec3::splat(scale));
    }

    /// Move by `delta` in world space.
    pub fn translate(&mut self, delta: Vec3) {
        self.translation += delta;
        self.dirty.set(true);
    }

    /// Apply a rotation on top of the current one.
    pub fn rotate(&mut self, rotation: Quat) {
        self.rotation = (rotation * self.rotation).normalize();
        self.dirty.set(true);
    }

    /// Object-to-world matrix.
    pub fn matrix(&self) -> Mat4 {
        self.refresh();
        self.cached_matrix.get()
    }

    /// Inverse-transpose of the upper 3x3, for transforming normals under
    /// non-uniform scale.
    pub fn normal_matrix(&self) -> Mat3 {
        self.refresh();
        self.cached_normal.get()
    }

    fn refresh(&self) {
        if !self.dirty.get() {
            return;
        }
        let matrix =
            Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation);
        let normal = Mat3::from_quat(self.rotation)
            * Mat3::from_diagonal(Vec3::ONE / self.scale);
        self.cached_matrix.set(matrix);
        self.cached_normal.set(normal);
        self.dirty.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_by_default() {
        let t = Transform::default();
        assert_eq!(t.matrix(), Mat4::IDENTITY);
        assert_eq!(t.normal_matrix(), Mat3::IDENTITY);
    }

    #[test]
    fn mutation_after_read_is_visible() {
        let mut t = Transform::default();
        // Prime the cache
        let _ = t.matrix();

        t.set_translation(Vec3::new(1.0, 2.0, 3.0));
        let m = t.matrix();
        assert_relative_eq!(m.w_axis.x, 1.0);
        assert_relative_eq!(m.w_axis.y, 2.0);
        assert_relative_eq!(m.w_axis.z, 3.0);
    }

    #[test]
    fn matrix_composes_scale_rotation_translation() {
        let mut t = Transform::default();
        t.set_translation(Vec3::new(0.0, 5.0, 0.0));
        t.set_scale(Vec3::new(2.0, 2.0, 2.0));

        let p = t.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 2.0);
        assert_relative_eq!(p.y, 5.0);
        assert_relative_eq!(p.z, 0.0);
    }

    #[test]
    fn normal_matrix_undoes_nonuniform_scale() {
        let mut t = Transform::default();
        t.set_scale(Vec3::new(2.0, 1.0, 1.0));

        // A normal along x must stay along x after renormalization
        let n = (t.normal_matrix() * Vec3::X).normalize();
        assert_relative_eq!(n.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn rotate_accumulates() {
        let mut t = Transform::default();
        let quarter = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        t.rotate(quarter);
        t.rotate(quarter);

        // Two quarter turns about Y send +X to -X
        let p = t.matrix().transform_point3(Vec3::X);
        assert_relative_eq!(p.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-5);
    }
}
