//! # Procedural Geometry Generation
//!
//! Meshes that do not come from an asset file: the skybox cube, and simple
//! shapes for floors and test scenes. Also hosts tangent-frame generation for
//! meshes whose source data lacks tangents.
//!
//! ```no_run
//! use umbra::gfx::geometry::{generate_cube, generate_plane};
//!
//! let cube = generate_cube();
//! let floor = generate_plane(20.0, 20.0, 4, 4);
//! assert!(cube.validate("cube").is_ok());
//! ```

pub mod primitives;

pub use primitives::*;

use cgmath::{InnerSpace, Vector2, Vector3};

use crate::gfx::scene::vertex::MeshData;

/// Fills `tangents` and `bitangents` from positions and texture coordinates
///
/// Does nothing when the mesh has no texture coordinates. Vertices whose
/// triangles have degenerate UVs get a zero frame.
pub fn compute_tangents(data: &mut MeshData) {
    if !data.has_tex_coords() {
        return;
    }
    let count = data.vertex_count();
    let mut tangents = vec![Vector3::new(0.0f32, 0.0, 0.0); count];
    let mut bitangents = vec![Vector3::new(0.0f32, 0.0, 0.0); count];

    for face in data.indices.chunks_exact(3) {
        let [a, b, c] = [face[0] as usize, face[1] as usize, face[2] as usize];
        let p0 = Vector3::from(data.positions[a]);
        let edge1 = Vector3::from(data.positions[b]) - p0;
        let edge2 = Vector3::from(data.positions[c]) - p0;

        let uv0 = Vector2::from(data.tex_coords[a]);
        let duv1 = Vector2::from(data.tex_coords[b]) - uv0;
        let duv2 = Vector2::from(data.tex_coords[c]) - uv0;

        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (edge1 * duv2.y - edge2 * duv1.y) * r;
        let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * r;

        for &i in &[a, b, c] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
        }
    }

    let normalized = |v: Vector3<f32>| -> [f32; 3] {
        if v.magnitude2() > 0.0 {
            v.normalize().into()
        } else {
            [0.0, 0.0, 0.0]
        }
    };
    data.tangents = tangents.into_iter().map(normalized).collect();
    data.bitangents = bitangents.into_iter().map(normalized).collect();
}
