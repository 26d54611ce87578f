//! The rendered scene: a textured unit cube and its per-frame transform

use bytemuck::{Pod, Zeroable};

use crate::foundation::math;

/// Interleaved vertex: position, color, texture coordinate
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Linear RGB multiplier applied to the texture
    pub color: [f32; 3],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

const fn vertex(position: [f32; 3], tex_coord: [f32; 2]) -> Vertex {
    Vertex {
        position,
        color: WHITE,
        tex_coord,
    }
}

/// Four vertices per face, so every face gets its own texture coordinates
pub const CUBE_VERTICES: [Vertex; 24] = [
    // top
    vertex([-0.5, -0.5, 0.5], [1.0, 0.0]),
    vertex([0.5, -0.5, 0.5], [0.0, 0.0]),
    vertex([0.5, 0.5, 0.5], [0.0, 1.0]),
    vertex([-0.5, 0.5, 0.5], [1.0, 1.0]),
    // bottom
    vertex([-0.5, -0.5, -0.5], [1.0, 0.0]),
    vertex([0.5, -0.5, -0.5], [0.0, 0.0]),
    vertex([0.5, 0.5, -0.5], [0.0, 1.0]),
    vertex([-0.5, 0.5, -0.5], [1.0, 1.0]),
    // left
    vertex([-0.5, -0.5, -0.5], [1.0, 1.0]),
    vertex([-0.5, -0.5, 0.5], [1.0, 0.0]),
    vertex([-0.5, 0.5, 0.5], [0.0, 0.0]),
    vertex([-0.5, 0.5, -0.5], [0.0, 1.0]),
    // right
    vertex([0.5, -0.5, -0.5], [0.0, 1.0]),
    vertex([0.5, -0.5, 0.5], [0.0, 0.0]),
    vertex([0.5, 0.5, 0.5], [1.0, 0.0]),
    vertex([0.5, 0.5, -0.5], [1.0, 1.0]),
    // front
    vertex([-0.5, -0.5, -0.5], [0.0, 1.0]),
    vertex([0.5, -0.5, -0.5], [1.0, 1.0]),
    vertex([0.5, -0.5, 0.5], [1.0, 0.0]),
    vertex([-0.5, -0.5, 0.5], [0.0, 0.0]),
    // back
    vertex([-0.5, 0.5, -0.5], [0.0, 1.0]),
    vertex([0.5, 0.5, -0.5], [1.0, 1.0]),
    vertex([0.5, 0.5, 0.5], [1.0, 0.0]),
    vertex([-0.5, 0.5, 0.5], [0.0, 0.0]),
];

/// Two triangles per face
pub const CUBE_INDICES: [u32; 36] = [
    0, 1, 2, 2, 3, 0, //
    4, 5, 6, 6, 7, 4, //
    8, 9, 10, 10, 11, 8, //
    12, 14, 13, 14, 12, 15, //
    16, 17, 18, 18, 19, 16, //
    20, 22, 21, 22, 20, 23,
];

/// Uniform block read by the vertex shader at binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UniformPayload {
    /// Column-major model-view-projection matrix
    pub mvp: [[f32; 4]; 4],
}

impl UniformPayload {
    /// Transform for `elapsed_secs` into the run at the given aspect ratio
    pub fn at(elapsed_secs: f32, aspect: f32) -> Self {
        Self {
            mvp: math::compose_mvp(elapsed_secs, aspect).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_indices_reference_existing_vertices() {
        assert!(CUBE_INDICES.iter().all(|&i| (i as usize) < CUBE_VERTICES.len()));
        assert_eq!(CUBE_INDICES.len() % 3, 0);
    }

    #[test]
    fn test_cube_spans_unit_extent() {
        for axis in 0..3 {
            let min = CUBE_VERTICES.iter().map(|v| v.position[axis]).fold(f32::MAX, f32::min);
            let max = CUBE_VERTICES.iter().map(|v| v.position[axis]).fold(f32::MIN, f32::max);
            assert_eq!((min, max), (-0.5, 0.5));
        }
    }

    #[test]
    fn test_uniform_payload_is_one_mat4() {
        assert_eq!(std::mem::size_of::<UniformPayload>(), 64);
        let payload = UniformPayload::at(0.0, 1.0);
        assert_eq!(payload.mvp, <[[f32; 4]; 4]>::from(math::compose_mvp(0.0, 1.0)));
    }

    #[test]
    fn test_vertex_bytes_are_tightly_packed() {
        let bytes: &[u8] = bytemuck::cast_slice(&CUBE_VERTICES);
        assert_eq!(bytes.len(), 24 * 32);
    }
}
