//! Batched distance and culling kernels over packed `[x, y, z]` position arrays.
//!
//! Large batches go through rayon; small ones stay on the calling thread.

use rayon::prelude::*;

/// Batches at or below this size run sequentially
pub const PARALLEL_THRESHOLD: usize = 1000;

/// Write the distance from `reference` for each packed position.
///
/// Processes `min(positions.len() / 3, results.len())` entries.
pub fn batch_distances(positions: &[f32], results: &mut [f32], reference: glam::Vec3) {
    let count = (positions.len() / 3).min(results.len());
    let dist = |(i, out): (usize, &mut f32)| {
        let p = glam::Vec3::from_slice(&positions[i * 3..i * 3 + 3]);
        *out = p.distance(reference);
    };

    if count > PARALLEL_THRESHOLD {
        results[..count].par_iter_mut().enumerate().for_each(dist);
    } else {
        results[..count].iter_mut().enumerate().for_each(dist);
    }
}

/// Flag positions within `max_distance` of `reference` with 1.0, others 0.0.
///
/// Returns the number of visible entries.
pub fn batch_distance_cull(
    positions: &[f32],
    flags: &mut [f32],
    reference: glam::Vec3,
    max_distance: f32,
) -> usize {
    let count = (positions.len() / 3).min(flags.len());
    let max_sq = max_distance * max_distance;
    let cull = |(i, flag): (usize, &mut f32)| -> usize {
        let p = glam::Vec3::from_slice(&positions[i * 3..i * 3 + 3]);
        let visible = p.distance_squared(reference) <= max_sq;
        *flag = if visible { 1.0 } else { 0.0 };
        usize::from(visible)
    };

    if count > PARALLEL_THRESHOLD {
        flags[..count].par_iter_mut().enumerate().map(cull).sum()
    } else {
        flags[..count].iter_mut().enumerate().map(cull).sum()
    }
}
