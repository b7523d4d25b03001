//! CPU-side meshes for instanced flora.
//!
//! Each batcher builds its base mesh once from a few primitives, merges
//! them into one [`MeshData`], and draws it instanced. Vertex colour carries
//! the part's base tint; per-instance colour multiplies on top. Soft batches
//! wrap their mesh in a [`SoftMesh`] that the deform kernels re-pose each
//! frame.

pub mod primitives;
pub mod soft;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

pub use primitives::{
    generate_cone, generate_cylinder, generate_dome, generate_quad, generate_sheet, generate_sphere,
};
pub use soft::SoftMesh;

/// Vertex with position, normal and tint (40 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            color: [1.0; 4],
        }
    }
}

/// Indexed triangle mesh
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(Vertex::new(position, normal));
        index
    }

    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Set every vertex colour
    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        for v in &mut self.vertices {
            v.color = color;
        }
        self
    }

    /// Apply a transform to positions and normals
    pub fn transformed(mut self, transform: Mat4) -> Self {
        // inverse-transpose keeps normals perpendicular under non-uniform scale
        let normal_matrix = transform.inverse().transpose();
        for v in &mut self.vertices {
            v.position = transform.transform_point3(Vec3::from(v.position)).to_array();
            v.normal = normal_matrix
                .transform_vector3(Vec3::from(v.normal))
                .normalize_or_zero()
                .to_array();
        }
        self
    }

    /// Append `other`, rebasing its indices
    pub fn append(&mut self, other: &MeshData) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Merge several parts into one mesh
    pub fn merge<'a>(parts: impl IntoIterator<Item = &'a MeshData>) -> MeshData {
        let mut merged = MeshData::new();
        for part in parts {
            merged.append(part);
        }
        merged
    }

    /// Axis-aligned bounds (min, max); zero for an empty mesh
    pub fn bounds(&self) -> (Vec3, Vec3) {
        if self.vertices.is_empty() {
            return (Vec3::ZERO, Vec3::ZERO);
        }
        self.vertices.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(lo, hi), v| {
                let p = Vec3::from(v.position);
                (lo.min(p), hi.max(p))
            },
        )
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
