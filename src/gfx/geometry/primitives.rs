//! # Primitive Shape Generation
//!
//! All shapes are Y-up with outward normals, counter-clockwise winding and a
//! full tangent frame.

use super::compute_tangents;
use crate::gfx::scene::vertex::MeshData;

/// Unit cube centered at the origin, -0.5 to 0.5 on every axis
pub fn generate_cube() -> MeshData {
    let positions = [
        // Front face
        [-0.5, -0.5,  0.5], [ 0.5, -0.5,  0.5], [ 0.5,  0.5,  0.5], [-0.5,  0.5,  0.5],
        // Back face
        [-0.5, -0.5, -0.5], [-0.5,  0.5, -0.5], [ 0.5,  0.5, -0.5], [ 0.5, -0.5, -0.5],
        // Left face
        [-0.5, -0.5, -0.5], [-0.5, -0.5,  0.5], [-0.5,  0.5,  0.5], [-0.5,  0.5, -0.5],
        // Right face
        [ 0.5, -0.5,  0.5], [ 0.5, -0.5, -0.5], [ 0.5,  0.5, -0.5], [ 0.5,  0.5,  0.5],
        // Top face
        [-0.5,  0.5,  0.5], [ 0.5,  0.5,  0.5], [ 0.5,  0.5, -0.5], [-0.5,  0.5, -0.5],
        // Bottom face
        [-0.5, -0.5, -0.5], [ 0.5, -0.5, -0.5], [ 0.5, -0.5,  0.5], [-0.5, -0.5,  0.5],
    ];

    let tex_coords = [
        [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0],
        [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0],
        [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0],
        [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0],
        [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0],
        [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0],
    ];

    let face_normals: [[f32; 3]; 6] = [
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
        [-1.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
    ];
    let normals = face_normals
        .iter()
        .flat_map(|n| std::iter::repeat(*n).take(4))
        .collect();

    let indices = (0..6u32)
        .flat_map(|face| {
            let base = face * 4;
            [base, base + 1, base + 2, base + 2, base + 3, base]
        })
        .collect();

    let mut data = MeshData {
        positions: positions.to_vec(),
        normals,
        tex_coords: tex_coords.to_vec(),
        indices,
        ..Default::default()
    };
    compute_tangents(&mut data);
    data
}

/// Flat plane in XZ facing +Y, centered at the origin
///
/// # Arguments
/// * `width` - Extent along X
/// * `depth` - Extent along Z
/// * `width_segments` / `depth_segments` - Subdivisions, at least 1
pub fn generate_plane(width: f32, depth: f32, width_segments: u32, depth_segments: u32) -> MeshData {
    let w_segs = width_segments.max(1);
    let d_segs = depth_segments.max(1);
    let mut data = MeshData::default();

    for z in 0..=d_segs {
        let v = z as f32 / d_segs as f32;
        for x in 0..=w_segs {
            let u = x as f32 / w_segs as f32;
            data.positions.push([(u - 0.5) * width, 0.0, (0.5 - v) * depth]);
            data.normals.push([0.0, 1.0, 0.0]);
            data.tex_coords.push([u * width, v * depth]);
        }
    }

    for z in 0..d_segs {
        for x in 0..w_segs {
            let i = z * (w_segs + 1) + x;
            let next_row = i + w_segs + 1;
            data.indices.extend_from_slice(&[i, i + 1, next_row, next_row, i + 1, next_row + 1]);
        }
    }

    compute_tangents(&mut data);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3};

    fn face_normal(data: &MeshData, face: &[u32]) -> Vector3<f32> {
        let p = |i: u32| Vector3::from(data.positions[i as usize]);
        (p(face[1]) - p(face[0])).cross(p(face[2]) - p(face[0]))
    }

    #[test]
    fn test_cube_is_valid_with_tangents() {
        let cube = generate_cube();
        assert!(cube.validate("cube").is_ok());
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        assert!(cube.has_tangent_frame());
    }

    #[test]
    fn test_cube_winding_matches_normals() {
        let cube = generate_cube();
        for face in cube.indices.chunks_exact(3) {
            let n = Vector3::from(cube.normals[face[0] as usize]);
            assert!(face_normal(&cube, face).dot(n) > 0.0);
        }
    }

    #[test]
    fn test_plane_faces_up_with_unit_tangents() {
        let plane = generate_plane(4.0, 2.0, 2, 1);
        assert!(plane.validate("plane").is_ok());
        assert_eq!(plane.vertex_count(), 6);
        for face in plane.indices.chunks_exact(3) {
            assert!(face_normal(&plane, face).y > 0.0);
        }
        for t in &plane.tangents {
            assert!((Vector3::from(*t).magnitude() - 1.0).abs() < 1e-4);
        }
    }
}
