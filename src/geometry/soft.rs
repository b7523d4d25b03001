//! Shared meshes re-posed every frame by the CPU deform kernels.
//!
//! A batch draws one mesh for all of its instances, so deforming that mesh
//! moves every instance together. The rest pose is kept aside and every
//! frame deforms from it, so the mesh never drifts.

use super::MeshData;
use crate::kernels::deform::{recompute_normals, DeformJob, DeformKind};

pub struct SoftMesh {
    mesh: MeshData,
    kind: DeformKind,
    strength: f32,
    frequency: f32,
    rebuild_normals: bool,
    rest: Vec<f32>,
    positions: Vec<f32>,
    normals: Vec<f32>,
    pending: bool,
    dirty: bool,
}

impl SoftMesh {
    pub fn new(mesh: MeshData, kind: DeformKind, strength: f32) -> Self {
        let rest: Vec<f32> = mesh.vertices.iter().flat_map(|v| v.position).collect();
        Self {
            positions: rest.clone(),
            normals: vec![0.0; rest.len()],
            rest,
            mesh,
            kind,
            strength,
            frequency: 1.0,
            rebuild_normals: false,
            pending: false,
            dirty: false,
        }
    }

    /// Spatial frequency of the wave kind
    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Rebuild smooth normals after each deform. Only for meshes whose
    /// triangles are wound consistently outward.
    pub fn with_rebuilt_normals(mut self) -> Self {
        self.rebuild_normals = true;
        self
    }

    /// Mesh in its current pose
    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    pub fn kind(&self) -> DeformKind {
        self.kind
    }

    /// Packed `[x, y, z]` rest positions
    pub fn rest_positions(&self) -> &[f32] {
        &self.rest
    }

    /// This frame's deform work, to be run (possibly batched with other
    /// meshes) and then committed with [`SoftMesh::apply`].
    pub fn job(&mut self, time: f32, audio_pulse: f32) -> DeformJob<'_> {
        self.pending = true;
        DeformJob {
            positions: &mut self.positions,
            original: &self.rest,
            kind: self.kind,
            time,
            strength: self.strength,
            audio_pulse,
            frequency: self.frequency,
        }
    }

    /// Write the deformed positions into the mesh. No-op unless a job was
    /// handed out since the last call.
    pub fn apply(&mut self) {
        if !self.pending {
            return;
        }
        self.pending = false;

        if self.rebuild_normals {
            recompute_normals(&self.positions, &mut self.normals, &self.mesh.indices);
        }
        for (i, (v, p)) in self.mesh.vertices.iter_mut().zip(self.positions.chunks_exact(3)).enumerate() {
            v.position = [p[0], p[1], p[2]];
            if self.rebuild_normals {
                v.normal = [self.normals[i * 3], self.normals[i * 3 + 1], self.normals[i * 3 + 2]];
            }
        }
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear and return the dirty flag (set by every [`SoftMesh::apply`])
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
