//! Keyboard-driven camera rig movement.

use glam::{EulerRot, Quat, Vec3};
use hashbrown::HashMap;
use lumen_scene::SceneObject;
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

const MOVE_SPEED: f32 = 3.0;
const LOOK_SPEED: f32 = 1.5;

/// Pitch limit just shy of straight up/down to keep the view basis stable.
const PITCH_LIMIT: f32 = 1.5;

/// Tracks key state and steers an object in the horizontal plane.
///
/// WASD moves, E/Q raise and lower, arrow keys look. The controller keeps
/// yaw/pitch accumulators and writes the combined orientation back to the
/// object's transform as a quaternion.
#[derive(Debug, Default)]
pub struct KeyboardController {
    keys: HashMap<KeyCode, bool>,
    yaw: f32,
    pitch: f32,
}

impl KeyboardController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a winit key event into the key-state map.
    pub fn process_key_event(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(key_code) = event.physical_key else {
            return;
        };
        self.keys
            .insert(key_code, event.state == ElementState::Pressed);
    }

    fn is_pressed(&self, key: KeyCode) -> bool {
        self.keys.get(&key).copied().unwrap_or(false)
    }

    /// Current look angles as (pitch, yaw, roll), for the view matrix.
    pub fn rotation(&self) -> Vec3 {
        Vec3::new(self.pitch, self.yaw, 0.0)
    }

    /// Apply one tick of look and planar movement to `object`.
    ///
    /// Movement is confined to the XZ plane plus vertical E/Q motion; the
    /// world is Y-down, so "up" is negative Y.
    pub fn move_in_plane_xz(&mut self, dt: f32, object: &mut SceneObject) {
        let mut rotate = Vec3::ZERO;
        if self.is_pressed(KeyCode::ArrowRight) {
            rotate.y += 1.0;
        }
        if self.is_pressed(KeyCode::ArrowLeft) {
            rotate.y -= 1.0;
        }
        if self.is_pressed(KeyCode::ArrowUp) {
            rotate.x += 1.0;
        }
        if self.is_pressed(KeyCode::ArrowDown) {
            rotate.x -= 1.0;
        }

        if rotate.length_squared() > f32::EPSILON {
            let delta = LOOK_SPEED * dt * rotate.normalize();
            self.pitch = (self.pitch + delta.x).clamp(-PITCH_LIMIT, PITCH_LIMIT);
            self.yaw = (self.yaw + delta.y).rem_euclid(std::f32::consts::TAU);
        }
        object.transform.set_rotation(Quat::from_euler(
            EulerRot::YXZ,
            self.yaw,
            self.pitch,
            0.0,
        ));

        let forward = Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos());
        let right = Vec3::new(forward.z, 0.0, -forward.x);
        let up = Vec3::new(0.0, -1.0, 0.0);

        let mut direction = Vec3::ZERO;
        if self.is_pressed(KeyCode::KeyW) {
            direction += forward;
        }
        if self.is_pressed(KeyCode::KeyS) {
            direction -= forward;
        }
        if self.is_pressed(KeyCode::KeyD) {
            direction += right;
        }
        if self.is_pressed(KeyCode::KeyA) {
            direction -= right;
        }
        if self.is_pressed(KeyCode::KeyE) {
            direction += up;
        }
        if self.is_pressed(KeyCode::KeyQ) {
            direction -= up;
        }

        if direction.length_squared() > f32::EPSILON {
            let translation =
                object.transform.translation() + MOVE_SPEED * dt * direction.normalize();
            object.transform.set_translation(translation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lumen_scene::Scene;

    fn press(controller: &mut KeyboardController, key: KeyCode) {
        controller.keys.insert(key, true);
    }

    #[test]
    fn forward_moves_along_positive_z_at_zero_yaw() {
        let mut scene = Scene::new();
        let object = scene.spawn();
        let mut controller = KeyboardController::new();
        press(&mut controller, KeyCode::KeyW);

        controller.move_in_plane_xz(1.0, object);

        let translation = object.transform.translation();
        assert_relative_eq!(translation.z, MOVE_SPEED, epsilon = 1e-6);
        assert_relative_eq!(translation.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(translation.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn diagonal_movement_is_normalized() {
        let mut scene = Scene::new();
        let object = scene.spawn();
        let mut controller = KeyboardController::new();
        press(&mut controller, KeyCode::KeyW);
        press(&mut controller, KeyCode::KeyD);

        controller.move_in_plane_xz(1.0, object);

        let translation = object.transform.translation();
        assert_relative_eq!(translation.length(), MOVE_SPEED, epsilon = 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut scene = Scene::new();
        let object = scene.spawn();
        let mut controller = KeyboardController::new();
        press(&mut controller, KeyCode::ArrowUp);

        // Far more look time than the clamp allows
        for _ in 0..100 {
            controller.move_in_plane_xz(0.1, object);
        }

        assert!(controller.rotation().x <= PITCH_LIMIT);
    }

    #[test]
    fn releasing_a_key_stops_movement() {
        let mut scene = Scene::new();
        let object = scene.spawn();
        let mut controller = KeyboardController::new();
        press(&mut controller, KeyCode::KeyW);
        controller.move_in_plane_xz(1.0, object);
        let after_press = object.transform.translation();

        controller.keys.insert(KeyCode::KeyW, false);
        controller.move_in_plane_xz(1.0, object);

        assert_eq!(object.transform.translation(), after_press);
    }
}
