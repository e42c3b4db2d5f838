//! Position, yaw/pitch rotation and scale with a derived orientation basis

use cgmath::{Deg, InnerSpace, Rad, Vector2, Vector3};

/// Fixed world up axis all bases are built against
pub const WORLD_UP: Vector3<f32> = Vector3::new(0.0, 1.0, 0.0);

/// Yaw of -90 degrees so an unrotated transform faces down -Z
pub const DEFAULT_ROTATION: Vector2<f32> = Vector2::new(-90.0, 0.0);

/// Position, rotation and scale of an object.
///
/// Rotation is `(yaw, pitch)` in degrees. The `front`/`right`/`up` basis is
/// private and only ever recomputed from the rotation, so it cannot drift
/// out of sync. Pitch is not clamped here; see [`crate::gfx::camera::Camera`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub scale: Vector3<f32>,
    rotation: Vector2<f32>,
    front: Vector3<f32>,
    right: Vector3<f32>,
    up: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(
            Vector3::new(0.0, 0.0, 0.0),
            DEFAULT_ROTATION,
            Vector3::new(1.0, 1.0, 1.0),
        )
    }
}

impl Transform {
    pub fn new(position: Vector3<f32>, rotation: Vector2<f32>, scale: Vector3<f32>) -> Self {
        let mut transform = Self {
            position,
            scale,
            rotation,
            front: Vector3::new(0.0, 0.0, -1.0),
            right: Vector3::new(1.0, 0.0, 0.0),
            up: WORLD_UP,
        };
        transform.update_vectors();
        transform
    }

    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn rotation(&self) -> Vector2<f32> {
        self.rotation
    }

    pub fn yaw(&self) -> f32 {
        self.rotation.x
    }

    pub fn pitch(&self) -> f32 {
        self.rotation.y
    }

    pub fn set_rotation(&mut self, rotation: Vector2<f32>) {
        self.rotation = rotation;
        self.update_vectors();
    }

    pub fn front(&self) -> Vector3<f32> {
        self.front
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    /// Recomputes the orientation basis from the current rotation
    pub fn update_vectors(&mut self) {
        let (front, right, up) = basis_from_rotation(self.rotation);
        self.front = front;
        self.right = right;
        self.up = up;
    }
}

/// `(front, right, up)` for a `(yaw, pitch)` rotation in degrees
pub fn basis_from_rotation(rotation: Vector2<f32>) -> (Vector3<f32>, Vector3<f32>, Vector3<f32>) {
    let yaw: Rad<f32> = Deg(rotation.x).into();
    let pitch: Rad<f32> = Deg(rotation.y).into();

    let front = Vector3::new(
        yaw.0.cos() * pitch.0.cos(),
        pitch.0.sin(),
        yaw.0.sin() * pitch.0.cos(),
    )
    .normalize();
    let right = front.cross(WORLD_UP).normalize();
    let up = right.cross(front).normalize();
    (front, right, up)
}
