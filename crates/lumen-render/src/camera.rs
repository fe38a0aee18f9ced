//! Camera with explicit projection and view matrix control.
//!
//! Conventions match the shaders: right-handed world, Y pointing down,
//! depth range [0, 1].

use glam::{Mat4, Vec3, Vec4};

/// Projection, view, and inverse-view matrices.
#[derive(Debug, Clone)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
    inverse_view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an orthographic projection over the given box.
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) {
        self.projection = Mat4::from_cols(
            Vec4::new(2.0 / (right - left), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / (bottom - top), 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0 / (far - near), 0.0),
            Vec4::new(
                -(right + left) / (right - left),
                -(bottom + top) / (bottom - top),
                -near / (far - near),
                1.0,
            ),
        );
    }

    /// Set a perspective projection.
    ///
    /// `fovy` is the vertical field of view in radians. Panics on a
    /// degenerate aspect ratio.
    pub fn set_perspective_projection(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        assert!(aspect.abs() > f32::EPSILON, "degenerate aspect ratio");
        let tan_half_fovy = (fovy * 0.5).tan();

        self.projection = Mat4::from_cols(
            Vec4::new(1.0 / (aspect * tan_half_fovy), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0 / tan_half_fovy, 0.0, 0.0),
            Vec4::new(0.0, 0.0, far / (far - near), 1.0),
            Vec4::new(0.0, 0.0, -(far * near) / (far - near), 0.0),
        );
    }

    /// Look along `direction` from `position`.
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        let w = direction.normalize();
        let u = w.cross(up).normalize();
        let v = w.cross(u);
        self.set_view_basis(position, u, v, w);
    }

    /// Look at `target` from `position`.
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// Set the view from a position and YXZ Euler rotation, the convention
    /// used by the keyboard controller.
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let (s3, c3) = rotation.z.sin_cos();
        let (s2, c2) = rotation.x.sin_cos();
        let (s1, c1) = rotation.y.sin_cos();

        let u = Vec3::new(c1 * c3 + s1 * s2 * s3, c2 * s3, c1 * s2 * s3 - c3 * s1);
        let v = Vec3::new(c3 * s1 * s2 - c1 * s3, c2 * c3, c1 * c3 * s2 + s1 * s3);
        let w = Vec3::new(c2 * s1, -s2, c1 * c2);
        self.set_view_basis(position, u, v, w);
    }

    fn set_view_basis(&mut self, position: Vec3, u: Vec3, v: Vec3, w: Vec3) {
        self.view = Mat4::from_cols(
            Vec4::new(u.x, v.x, w.x, 0.0),
            Vec4::new(u.y, v.y, w.y, 0.0),
            Vec4::new(u.z, v.z, w.z, 0.0),
            Vec4::new(-u.dot(position), -v.dot(position), -w.dot(position), 1.0),
        );
        self.inverse_view = Mat4::from_cols(
            u.extend(0.0),
            v.extend(0.0),
            w.extend(0.0),
            position.extend(1.0),
        );
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn inverse_view(&self) -> Mat4 {
        self.inverse_view
    }

    /// World-space camera position.
    pub fn position(&self) -> Vec3 {
        self.inverse_view.w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        for (x, y) in a.to_cols_array().iter().zip(b.to_cols_array().iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-5);
        }
    }

    #[test]
    fn view_maps_target_onto_forward_axis() {
        let mut camera = Camera::new();
        let position = Vec3::new(0.0, 0.0, -5.0);
        camera.set_view_target(position, Vec3::ZERO, Vec3::new(0.0, -1.0, 0.0));

        let p = camera.view().transform_point3(Vec3::ZERO);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn inverse_view_is_the_inverse() {
        let mut camera = Camera::new();
        camera.set_view_yxz(Vec3::new(1.0, -2.0, 3.0), Vec3::new(0.2, 0.7, 0.0));
        assert_mat_eq(camera.view() * camera.inverse_view(), Mat4::IDENTITY);
    }

    #[test]
    fn position_survives_the_view_round_trip() {
        let mut camera = Camera::new();
        let position = Vec3::new(4.0, -1.5, 2.0);
        camera.set_view_yxz(position, Vec3::new(0.0, 1.2, 0.0));
        let recovered = camera.position();
        assert_relative_eq!(recovered.x, position.x, epsilon = 1e-5);
        assert_relative_eq!(recovered.y, position.y, epsilon = 1e-5);
        assert_relative_eq!(recovered.z, position.z, epsilon = 1e-5);
    }

    #[test]
    fn perspective_depth_maps_to_zero_one() {
        let mut camera = Camera::new();
        let (near, far) = (0.1, 100.0);
        camera.set_perspective_projection(1.0, 16.0 / 9.0, near, far);

        let near_clip = camera.projection() * Vec4::new(0.0, 0.0, near, 1.0);
        assert_relative_eq!(near_clip.z / near_clip.w, 0.0, epsilon = 1e-5);

        let far_clip = camera.projection() * Vec4::new(0.0, 0.0, far, 1.0);
        assert_relative_eq!(far_clip.z / far_clip.w, 1.0, epsilon = 1e-4);
    }

    #[test]
    #[should_panic(expected = "degenerate aspect ratio")]
    fn zero_aspect_panics() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(1.0, 0.0, 0.1, 10.0);
    }

    #[test]
    fn orthographic_maps_box_to_ndc() {
        let mut camera = Camera::new();
        camera.set_orthographic_projection(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);

        let p = camera.projection() * Vec4::new(2.0, 1.0, 10.0, 1.0);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 1.0, epsilon = 1e-5);
    }
}
