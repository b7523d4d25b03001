//! CPU vertex deformation for soft, audio-driven meshes.
//!
//! Every deformer reads the rest pose from `original` and writes into
//! `positions` (both packed `[x, y, z]`), so repeated calls never drift.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Vertex counts above this run in parallel
pub const DEFORM_PARALLEL_THRESHOLD: usize = 500;

/// Preferred number of vertices per deform job
pub const DEFORM_BATCH_SIZE: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeformKind {
    /// Rolling sine/cosine surface wave (ground cover, water)
    Wave,
    /// Side-to-side jelly wobble (mushrooms)
    Jiggle,
    /// Height-weighted lean (trees)
    Wobble,
}

fn for_each_vertex(
    positions: &mut [f32],
    original: &[f32],
    f: impl Fn(&mut [f32], &[f32]) + Sync + Send,
) {
    let count = positions.len().min(original.len()) / 3;
    let (positions, original) = (&mut positions[..count * 3], &original[..count * 3]);
    if count > DEFORM_PARALLEL_THRESHOLD {
        positions
            .par_chunks_exact_mut(3)
            .zip(original.par_chunks_exact(3))
            .for_each(|(p, o)| f(p, o));
    } else {
        positions
            .chunks_exact_mut(3)
            .zip(original.chunks_exact(3))
            .for_each(|(p, o)| f(p, o));
    }
}

/// Offset Y by `sin(x*f + 2t) * cos(z*f + 2t)`, boosted up to 1.5x by audio
pub fn deform_wave(
    positions: &mut [f32],
    original: &[f32],
    time: f32,
    frequency: f32,
    strength: f32,
    audio_pulse: f32,
) {
    let t2 = time * 2.0;
    let strength = strength * (1.0 + audio_pulse * 0.5);
    for_each_vertex(positions, original, |p, o| {
        let wave = (o[0] * frequency + t2).sin() * (o[2] * frequency + t2).cos();
        p[1] = o[1] + wave * strength;
    });
}

/// Shift X/Z with a height-phased sine, doubled by a full audio pulse
pub fn deform_jiggle(positions: &mut [f32], original: &[f32], time: f32, strength: f32, audio_pulse: f32) {
    let t5 = time * 5.0;
    let strength = strength * 0.1 * (1.0 + audio_pulse);
    for_each_vertex(positions, original, |p, o| {
        let phase = t5 + o[1] * 2.0;
        let offset = phase.sin() * strength;
        p[0] = o[0] + offset;
        p[2] = o[2] + offset * phase.cos();
    });
}

/// Lean X proportionally to height (y / 5), so roots stay planted
pub fn deform_wobble(positions: &mut [f32], original: &[f32], time: f32, strength: f32, audio_pulse: f32) {
    let t2 = time * 2.0;
    let base = strength * 0.05;
    let audio_scale = 1.0 + audio_pulse * 0.3;
    for_each_vertex(positions, original, |p, o| {
        let wobble = (t2 + o[1] * 0.5).sin() * base;
        let height_factor = o[1] / 5.0;
        p[0] = o[0] + wobble * height_factor * audio_scale;
    });
}

/// Rebuild smooth per-vertex normals from an indexed triangle list.
///
/// `normals` must hold 3 floats per vertex. Triangles referencing vertices
/// outside `positions` are skipped.
pub fn recompute_normals(positions: &[f32], normals: &mut [f32], indices: &[u32]) {
    let vertex_count = (positions.len() / 3).min(normals.len() / 3);
    normals.fill(0.0);

    let vert = |i: usize| glam::Vec3::from_slice(&positions[i * 3..i * 3 + 3]);

    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
            continue;
        }
        let (v0, v1, v2) = (vert(i0), vert(i1), vert(i2));
        // area-weighted face normal
        let n = (v1 - v0).cross(v2 - v0);
        for i in [i0, i1, i2] {
            normals[i * 3] += n.x;
            normals[i * 3 + 1] += n.y;
            normals[i * 3 + 2] += n.z;
        }
    }

    for n in normals[..vertex_count * 3].chunks_exact_mut(3) {
        let v = glam::Vec3::from_slice(n);
        let len = v.length();
        if len > 0.0001 {
            (v / len).write_to_slice(n);
        }
    }
}

/// One mesh to deform in a [`batch_deform`] call
pub struct DeformJob<'a> {
    pub positions: &'a mut [f32],
    pub original: &'a [f32],
    pub kind: DeformKind,
    pub time: f32,
    pub strength: f32,
    pub audio_pulse: f32,
    /// Wave frequency; ignored by the other kinds
    pub frequency: f32,
}

/// Deform many meshes, one rayon task per mesh
pub fn batch_deform(jobs: &mut [DeformJob<'_>]) {
    jobs.par_iter_mut().for_each(|job| match job.kind {
        DeformKind::Wave => deform_wave(
            job.positions,
            job.original,
            job.time,
            job.frequency,
            job.strength,
            job.audio_pulse,
        ),
        DeformKind::Jiggle => {
            deform_jiggle(job.positions, job.original, job.time, job.strength, job.audio_pulse)
        }
        DeformKind::Wobble => {
            deform_wobble(job.positions, job.original, job.time, job.strength, job.audio_pulse)
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(n: usize) -> Vec<f32> {
        (0..n).flat_map(|i| [0.5, i as f32 * 0.1, -0.25]).collect()
    }

    #[test]
    fn test_wave_only_moves_y() {
        let original = column(10);
        let mut positions = original.clone();
        deform_wave(&mut positions, &original, 0.4, 1.3, 0.5, 1.0);
        for (p, o) in positions.chunks(3).zip(original.chunks(3)) {
            assert_eq!(p[0], o[0]);
            assert_eq!(p[2], o[2]);
            assert!((p[1] - o[1]).abs() <= 0.75 + 1e-6);
        }
    }

    #[test]
    fn test_deform_is_idempotent_per_time() {
        let original = column(800);
        let mut a = original.clone();
        let mut b = original.clone();
        deform_jiggle(&mut a, &original, 1.0, 1.0, 0.5);
        deform_jiggle(&mut b, &original, 1.0, 1.0, 0.5);
        deform_jiggle(&mut b, &original, 1.0, 1.0, 0.5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_wobble_keeps_roots_planted() {
        let original = column(20);
        let mut positions = original.clone();
        deform_wobble(&mut positions, &original, 0.3, 2.0, 1.0);
        // y = 0 at the root
        assert_eq!(positions[0], original[0]);
        assert_ne!(positions[19 * 3], original[19 * 3]);
    }

    #[test]
    fn test_recompute_normals_flat_quad() {
        let positions = [
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 0.0, 1.0, //
            0.0, 0.0, 1.0,
        ];
        let indices = [0, 2, 1, 0, 3, 2];
        let mut normals = [0.0; 12];
        recompute_normals(&positions, &mut normals, &indices);
        for n in normals.chunks(3) {
            assert!((n[1] - 1.0).abs() < 1e-6, "expected +Y normal, got {n:?}");
        }
    }

    #[test]
    fn test_recompute_normals_skips_bad_indices() {
        let positions = [0.0; 9];
        let mut normals = [1.0; 9];
        recompute_normals(&positions, &mut normals, &[0, 1, 7]);
        assert_eq!(normals, [0.0; 9]);
    }

    #[test]
    fn test_batch_deform_routes_kinds() {
        let original = column(4);
        let mut a = original.clone();
        let mut b = original.clone();
        let mut jobs = vec![
            DeformJob { positions: &mut a, original: &original, kind: DeformKind::Wave, time: 0.5, strength: 1.0, audio_pulse: 0.0, frequency: 2.0 },
            DeformJob { positions: &mut b, original: &original, kind: DeformKind::Wobble, time: 0.5, strength: 1.0, audio_pulse: 0.0, frequency: 0.0 },
        ];
        batch_deform(&mut jobs);
        drop(jobs);

        let mut expected = original.clone();
        deform_wave(&mut expected, &original, 0.5, 2.0, 1.0, 0.0);
        assert_eq!(a, expected);
        let mut expected = original.clone();
        deform_wobble(&mut expected, &original, 0.5, 1.0, 0.0);
        assert_eq!(b, expected);
    }
}
