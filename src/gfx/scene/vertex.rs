//! # Vertex Data Structures
//!
//! Decoded per-vertex attribute streams and the matching GPU buffer layouts.
//!
//! Each attribute lives in its own buffer so that missing streams (texture
//! coordinates, tangents, bitangents) can be substituted without re-packing
//! an interleaved vertex.

use crate::gfx::error::RenderError;

/// Shader location of each vertex attribute stream
pub const POSITION_LOCATION: u32 = 0;
pub const NORMAL_LOCATION: u32 = 1;
pub const TEX_COORD_LOCATION: u32 = 2;
pub const TANGENT_LOCATION: u32 = 3;
pub const BITANGENT_LOCATION: u32 = 4;

/// Already-decoded geometry for one drawable surface.
///
/// `tex_coords`, `tangents` and `bitangents` may be empty when the source
/// asset lacks them; every other stream must have one entry per position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub tangents: Vec<[f32; 3]>,
    pub bitangents: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Checks stream lengths and index bounds.
    ///
    /// # Arguments
    /// * `name` - Asset name used in the error message
    pub fn validate(&self, name: &str) -> Result<(), RenderError> {
        let count = self.vertex_count();
        if count == 0 {
            return Err(RenderError::invalid_asset(name, "mesh has no vertices"));
        }
        if self.indices.is_empty() {
            return Err(RenderError::invalid_asset(name, "mesh has no faces"));
        }
        if self.indices.len() % 3 != 0 {
            return Err(RenderError::invalid_asset(
                name,
                format!("index count {} is not a multiple of 3", self.indices.len()),
            ));
        }

        let streams = [
            ("normals", self.normals.len(), false),
            ("texturecoords", self.tex_coords.len(), true),
            ("tangents", self.tangents.len(), true),
            ("bitangents", self.bitangents.len(), true),
        ];
        for (stream, len, optional) in streams {
            if len != count && !(optional && len == 0) {
                return Err(RenderError::invalid_asset(
                    name,
                    format!("{stream} has {len} entries for {count} vertices"),
                ));
            }
        }

        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= count) {
            return Err(RenderError::invalid_asset(
                name,
                format!("face index {bad} out of range for {count} vertices"),
            ));
        }
        Ok(())
    }

    pub fn has_tex_coords(&self) -> bool {
        !self.tex_coords.is_empty()
    }

    pub fn has_tangent_frame(&self) -> bool {
        !self.tangents.is_empty() && !self.bitangents.is_empty()
    }
}

const VEC3_ATTRIBUTES: [[wgpu::VertexAttribute; 1]; 5] = [
    wgpu::vertex_attr_array![0 => Float32x3],
    wgpu::vertex_attr_array![1 => Float32x3],
    wgpu::vertex_attr_array![2 => Float32x3],
    wgpu::vertex_attr_array![3 => Float32x3],
    wgpu::vertex_attr_array![4 => Float32x3],
];

const TEX_COORD_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![2 => Float32x2];

fn vec3_stream(location: u32) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VEC3_ATTRIBUTES[location as usize],
    }
}

/// Layout of the position stream alone, used by the depth and skybox programs
pub fn position_layout() -> [wgpu::VertexBufferLayout<'static>; 1] {
    [vec3_stream(POSITION_LOCATION)]
}

/// Layouts of all five streams in buffer-slot order, used by the lighting program
pub fn full_layout() -> [wgpu::VertexBufferLayout<'static>; 5] {
    [
        vec3_stream(POSITION_LOCATION),
        vec3_stream(NORMAL_LOCATION),
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &TEX_COORD_ATTRIBUTES,
        },
        vec3_stream(TANGENT_LOCATION),
        vec3_stream(BITANGENT_LOCATION),
    ]
}
