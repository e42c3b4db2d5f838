//! CPU mirror of the `Uniforms` block in `shaders/uniforms.wgsl`
//!
//! Programs address uniforms by their scene-facing names (`"viewProject"`,
//! `"pointLights[2].diffuse"`, ...). [`slot_for`] maps each name onto its byte
//! offset in the block; the render engine keeps one [`UniformBlock`] per
//! program and snapshots it into the uniform ring at every draw.
//!
//! Every scalar is stored as `f32` since the block packs them into `vec4`s.

use cgmath::Matrix4;

use crate::gfx::device::Uniform;
use crate::gfx::scene::light::MAX_POINT_LIGHTS;

pub const UNIFORM_BLOCK_SIZE: usize = 768;

const POINT_LIGHTS_BASE: usize = 448;
const POINT_LIGHT_STRIDE: usize = 80;

/// Maps OpenGL clip space (z in -1..1) to wgpu clip space (z in 0..1)
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Mat4,
    Vec3,
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub offset: usize,
    pub kind: SlotKind,
    /// Matrices that end in clip space get the depth-range fix applied
    pub clip_space: bool,
}

impl Slot {
    const fn new(offset: usize, kind: SlotKind) -> Self {
        Self {
            offset,
            kind,
            clip_space: false,
        }
    }

    const fn clip(offset: usize) -> Self {
        Self {
            offset,
            kind: SlotKind::Mat4,
            clip_space: true,
        }
    }
}

fn point_light_slot(name: &str) -> Option<Slot> {
    let rest = name.strip_prefix("pointLights[")?;
    let (index, field) = rest.split_once("].")?;
    let index: usize = index.parse().ok()?;
    if index >= MAX_POINT_LIGHTS {
        return None;
    }
    let base = POINT_LIGHTS_BASE + index * POINT_LIGHT_STRIDE;
    let slot = match field {
        "position" => Slot::new(base, SlotKind::Vec3),
        "ambient" => Slot::new(base + 16, SlotKind::Vec3),
        "diffuse" => Slot::new(base + 32, SlotKind::Vec3),
        "specular" => Slot::new(base + 48, SlotKind::Vec3),
        "constant" => Slot::new(base + 64, SlotKind::Scalar),
        "linear" => Slot::new(base + 68, SlotKind::Scalar),
        "quadratic" => Slot::new(base + 72, SlotKind::Scalar),
        _ => return None,
    };
    Some(slot)
}

/// Byte slot of a named uniform, `None` for names the block does not carry
///
/// Sampler names such as `"mat.diffuseMap"` are absent: texture units are
/// fixed bindings in the wgpu backend.
pub fn slot_for(name: &str) -> Option<Slot> {
    let slot = match name {
        "model" => Slot::new(0, SlotKind::Mat4),
        "viewProject" => Slot::clip(64),
        "view" => Slot::new(128, SlotKind::Mat4),
        "projection" => Slot::clip(192),
        "lightSpaceMatrix" => Slot::clip(256),
        "viewPos" => Slot::new(320, SlotKind::Vec3),
        "mat.shininess" => Slot::new(336, SlotKind::Scalar),
        "mat.heightScale" => Slot::new(340, SlotKind::Scalar),
        "pointLightCount" => Slot::new(344, SlotKind::Scalar),
        "mat.hasNormalMap" => Slot::new(352, SlotKind::Scalar),
        "mat.hasSpecularMap" => Slot::new(356, SlotKind::Scalar),
        "mat.hasDepthMap" => Slot::new(360, SlotKind::Scalar),
        "globalLight.position" => Slot::new(368, SlotKind::Vec3),
        "globalLight.direction" => Slot::new(384, SlotKind::Vec3),
        "globalLight.ambient" => Slot::new(400, SlotKind::Vec3),
        "globalLight.diffuse" => Slot::new(416, SlotKind::Vec3),
        "globalLight.specular" => Slot::new(432, SlotKind::Vec3),
        _ => return point_light_slot(name),
    };
    Some(slot)
}

/// One program's uniform values
#[derive(Clone)]
pub struct UniformBlock {
    bytes: [u8; UNIFORM_BLOCK_SIZE],
}

impl Default for UniformBlock {
    fn default() -> Self {
        Self {
            bytes: [0; UNIFORM_BLOCK_SIZE],
        }
    }
}

impl UniformBlock {
    /// Writes `value`; returns false if the name is unknown or the type mismatches
    pub fn set(&mut self, name: &str, value: Uniform) -> bool {
        let Some(slot) = slot_for(name) else {
            return false;
        };
        match (slot.kind, value) {
            (SlotKind::Mat4, Uniform::Mat4(m)) => {
                let m = if slot.clip_space {
                    OPENGL_TO_WGPU_MATRIX * m
                } else {
                    m
                };
                let cols: [[f32; 4]; 4] = m.into();
                self.write(slot.offset, bytemuck::cast_slice(&cols));
            }
            (SlotKind::Vec3, Uniform::Vec3(v)) => {
                let v: [f32; 3] = v.into();
                self.write(slot.offset, bytemuck::cast_slice(&v));
            }
            (SlotKind::Scalar, Uniform::Float(f)) => self.write(slot.offset, bytemuck::bytes_of(&f)),
            (SlotKind::Scalar, Uniform::Int(i)) => {
                self.write(slot.offset, bytemuck::bytes_of(&(i as f32)))
            }
            _ => return false,
        }
        true
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn read_f32(&self, offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&self.bytes[offset..offset + 4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Vector3};

    #[test]
    fn test_block_ends_after_last_point_light() {
        let last = slot_for(&format!("pointLights[{}].quadratic", MAX_POINT_LIGHTS - 1)).unwrap();
        assert_eq!(
            POINT_LIGHTS_BASE + MAX_POINT_LIGHTS * POINT_LIGHT_STRIDE,
            UNIFORM_BLOCK_SIZE
        );
        assert!(last.offset + 4 <= UNIFORM_BLOCK_SIZE);
        assert_eq!(slot_for("pointLights[4].position"), None);
    }

    #[test]
    fn test_samplers_are_not_block_members() {
        for name in ["mat.diffuseMap", "shadowMap", "skybox"] {
            assert_eq!(slot_for(name), None);
        }
    }

    #[test]
    fn test_clip_matrices_get_depth_fix() {
        let mut block = UniformBlock::default();
        assert!(block.set("viewProject", Uniform::Mat4(Matrix4::identity())));
        assert!(block.set("view", Uniform::Mat4(Matrix4::identity())));
        // column 2 row 2 of viewProject
        assert_eq!(block.read_f32(64 + 40), 0.5);
        assert_eq!(block.read_f32(64 + 56), 0.5);
        assert_eq!(block.read_f32(128 + 40), 1.0);
    }

    #[test]
    fn test_int_uniform_stored_as_float() {
        let mut block = UniformBlock::default();
        assert!(block.set("pointLightCount", Uniform::Int(3)));
        assert_eq!(block.read_f32(344), 3.0);
    }

    #[test]
    fn test_point_light_fields() {
        let mut block = UniformBlock::default();
        assert!(block.set("pointLights[1].diffuse", Uniform::Vec3(Vector3::new(0.25, 0.5, 0.75))));
        assert!(block.set("pointLights[1].linear", Uniform::Float(0.09)));
        assert_eq!(block.read_f32(448 + 80 + 32 + 4), 0.5);
        assert_eq!(block.read_f32(448 + 80 + 68), 0.09);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut block = UniformBlock::default();
        assert!(!block.set("model", Uniform::Float(1.0)));
        assert!(!block.set("unknown", Uniform::Float(1.0)));
        assert!(block.as_bytes().iter().all(|b| *b == 0));
    }
}
