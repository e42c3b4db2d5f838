//! First-person fly camera
//!
//! Translates along its own front/right axes and world up, looks around with
//! yaw/pitch from mouse deltas, and produces right-handed view and
//! perspective matrices in OpenGL clip conventions. The wgpu backend converts
//! to its own clip space when the matrices are uploaded.

use cgmath::{Deg, EuclideanSpace, Matrix4, Point3, Vector2, Vector3};

use super::input::{FrameInput, Movement};
use crate::config::EngineConfig;
use crate::gfx::error::RenderError;
use crate::gfx::scene::object::Updatable;
use crate::gfx::scene::transform::{Transform, WORLD_UP};

/// Pitch limit keeping front away from the world up singularity
pub const PITCH_LIMIT: f32 = 89.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub transform: Transform,
    pub fov: Deg<f32>,
    /// Units per second
    pub speed: f32,
    /// Degrees per unit of mouse delta
    pub sensitivity: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            fov: Deg(45.0),
            speed: 10.0,
            sensitivity: 0.25,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vector3<f32>) -> Self {
        Self {
            transform: Transform::at(position),
            ..Default::default()
        }
    }

    pub fn from_config(position: Vector3<f32>, config: &EngineConfig) -> Self {
        Self {
            transform: Transform::at(position),
            fov: Deg(config.field_of_view),
            speed: config.camera_speed,
            sensitivity: config.mouse_sensitivity,
            near: config.near_plane,
            far: config.far_plane,
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.transform.position
    }

    /// Moves `speed * dt` along each active direction
    pub fn translate(&mut self, movement: Movement, dt: f32) {
        let velocity = self.speed * dt;
        let front = self.transform.front();
        let right = self.transform.right();

        let axes = [
            (Movement::FORWARD, front),
            (Movement::BACKWARD, -front),
            (Movement::RIGHT, right),
            (Movement::LEFT, -right),
            (Movement::UP, WORLD_UP),
            (Movement::DOWN, -WORLD_UP),
        ];
        for (flag, axis) in axes {
            if movement.contains(flag) {
                self.transform.position += axis * velocity;
            }
        }
    }

    /// Adds scaled mouse deltas to yaw and pitch, clamping pitch to ±[`PITCH_LIMIT`]
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let rotation = self.transform.rotation();
        let yaw = rotation.x + dx * self.sensitivity;
        let pitch = (rotation.y + dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.transform.set_rotation(Vector2::new(yaw, pitch));
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        let eye = Point3::from_vec(self.transform.position);
        Matrix4::look_at_rh(eye, eye + self.transform.front(), self.transform.up())
    }

    /// Perspective projection for a `width` x `height` viewport
    ///
    /// # Errors
    /// [`RenderError::DegenerateViewport`] when `height` is zero
    pub fn projection_matrix(&self, width: u32, height: u32) -> Result<Matrix4<f32>, RenderError> {
        if height == 0 {
            return Err(RenderError::DegenerateViewport { width, height });
        }
        let aspect = width as f32 / height as f32;
        Ok(cgmath::perspective(self.fov, aspect, self.near, self.far))
    }
}

impl Updatable for Camera {
    fn update(&mut self, dt: f32, input: &FrameInput) {
        if !input.movement.is_empty() {
            self.translate(input.movement, dt);
        }
        let (dx, dy) = input.look;
        if dx != 0.0 || dy != 0.0 {
            self.rotate(dx, dy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn test_move_forward_scales_with_speed_and_dt() {
        let mut camera = Camera::new(Vector3::new(0.0, 10.0, 0.0));
        let front = camera.transform.front();
        let start = camera.position();

        camera.translate(Movement::FORWARD, 1.0);

        let expected_z = start.z + 10.0 * front.z;
        assert!((camera.position().z - expected_z).abs() < EPSILON);
        assert!(camera.position().z < start.z);
        assert!((camera.position().y - 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_opposite_directions_cancel() {
        let mut camera = Camera::new(Vector3::new(1.0, 2.0, 3.0));
        camera.translate(Movement::FORWARD | Movement::BACKWARD, 0.5);
        camera.translate(Movement::LEFT | Movement::RIGHT | Movement::UP | Movement::DOWN, 0.5);
        assert!((camera.position() - Vector3::new(1.0, 2.0, 3.0)).magnitude() < EPSILON);
    }

    #[test]
    fn test_move_up_uses_world_up() {
        let mut camera = Camera::new(Vector3::new(0.0, 0.0, 0.0));
        camera.rotate(0.0, 160.0);
        camera.translate(Movement::UP, 0.5);
        assert!((camera.position() - Vector3::new(0.0, 5.0, 0.0)).magnitude() < EPSILON);
    }

    #[test]
    fn test_pitch_converges_to_clamp() {
        let mut camera = Camera::default();
        for _ in 0..10 {
            camera.rotate(0.0, 200.0);
            assert!(camera.transform.pitch() <= PITCH_LIMIT);
        }
        assert_eq!(camera.transform.pitch(), PITCH_LIMIT);

        for _ in 0..10 {
            camera.rotate(0.0, -200.0);
        }
        assert_eq!(camera.transform.pitch(), -PITCH_LIMIT);
    }

    #[test]
    fn test_rotate_applies_sensitivity_to_yaw() {
        let mut camera = Camera::default();
        let yaw = camera.transform.yaw();
        camera.rotate(40.0, 0.0);
        assert!((camera.transform.yaw() - (yaw + 10.0)).abs() < EPSILON);
    }

    #[test]
    fn test_view_matrix_puts_target_on_negative_z() {
        let camera = Camera::new(Vector3::new(0.0, 10.0, 0.0));
        let target = camera.position() + camera.transform.front() * 5.0;
        let p = camera.view_matrix() * target.extend(1.0);
        assert!(p.x.abs() < EPSILON);
        assert!(p.y.abs() < EPSILON);
        assert!((p.z + 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_zero_height_viewport_rejected() {
        let camera = Camera::default();
        assert!(matches!(
            camera.projection_matrix(800, 0),
            Err(RenderError::DegenerateViewport { .. })
        ));
        assert!(camera.projection_matrix(800, 600).is_ok());
    }

    #[test]
    fn test_update_consumes_frame_input() {
        let mut camera = Camera::new(Vector3::new(0.0, 0.0, 0.0));
        let input = FrameInput {
            movement: Movement::UP,
            look: (4.0, 0.0),
            quit: false,
        };
        camera.update(0.1, &input);
        assert!((camera.position().y - 1.0).abs() < EPSILON);
        assert!((camera.transform.yaw() - (-89.0)).abs() < EPSILON);
    }
}
