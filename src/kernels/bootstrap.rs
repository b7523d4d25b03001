//! Spawn-area heightmap precompute.
//!
//! Flora placement around the player spawn queries ground height thousands
//! of times during world setup. The heightmap is computed once (rows in
//! parallel) while the loading screen polls [`BootstrapProgress`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use rayon::prelude::*;

use super::math::{fbm, value_noise_2d};

/// Grid cells per side
pub const HEIGHTMAP_SIZE: usize = 64;

/// Half-extent of the precomputed square, world units
pub const SPAWN_AREA_RADIUS: f32 = 32.0;

/// Ground height anywhere in the world (slow path)
pub fn ground_height(x: f32, z: f32) -> f32 {
    let mut h = fbm(x * 0.05, z * 0.05, 4);
    h += value_noise_2d(x * 0.1, z * 0.1) * 0.5;
    h * 3.0
}

/// Progress shared with the loading screen
#[derive(Debug, Default)]
pub struct BootstrapProgress {
    completed_rows: AtomicUsize,
    complete: AtomicBool,
}

impl BootstrapProgress {
    /// Percent complete, 0..=100
    pub fn percent(&self) -> u32 {
        if self.is_complete() {
            return 100;
        }
        let rows = self.completed_rows.load(Ordering::Relaxed).min(HEIGHTMAP_SIZE);
        (rows * 100 / HEIGHTMAP_SIZE) as u32
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    fn row_done(&self) {
        self.completed_rows.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self) {
        self.complete.store(true, Ordering::Release);
    }
}

/// Precomputed heights over `[-R, R]^2` around the spawn point
#[derive(Clone, Debug)]
pub struct SpawnHeightmap {
    heights: Vec<f32>,
}

impl SpawnHeightmap {
    /// Spacing between samples in world units. The outer samples sit on
    /// the area edges, so `[-R, R]` is covered end to end.
    pub const CELL_SIZE: f32 = 2.0 * SPAWN_AREA_RADIUS / (HEIGHTMAP_SIZE - 1) as f32;

    /// Compute the heightmap on the rayon pool, reporting per-row progress
    pub fn generate(progress: &BootstrapProgress) -> Self {
        let mut heights = vec![0.0; HEIGHTMAP_SIZE * HEIGHTMAP_SIZE];

        heights
            .par_chunks_mut(HEIGHTMAP_SIZE)
            .enumerate()
            .for_each(|(row, cells)| {
                let z = -SPAWN_AREA_RADIUS + row as f32 * Self::CELL_SIZE;
                for (col, h) in cells.iter_mut().enumerate() {
                    let x = -SPAWN_AREA_RADIUS + col as f32 * Self::CELL_SIZE;
                    *h = ground_height(x, z);
                }
                progress.row_done();
            });

        progress.finish();
        log::debug!("Spawn heightmap ready ({0}x{0})", HEIGHTMAP_SIZE);
        Self { heights }
    }

    /// Start generation on a background thread. Poll the returned progress,
    /// then join the handle for the map.
    pub fn spawn() -> (Arc<BootstrapProgress>, JoinHandle<SpawnHeightmap>) {
        let progress = Arc::new(BootstrapProgress::default());
        let worker_progress = Arc::clone(&progress);
        let handle = std::thread::spawn(move || Self::generate(&worker_progress));
        (progress, handle)
    }

    fn at(&self, col: usize, row: usize) -> f32 {
        self.heights[row * HEIGHTMAP_SIZE + col]
    }

    /// Height at a world position. Bilinear inside the precomputed square,
    /// falls back to [`ground_height`] outside it.
    pub fn height(&self, x: f32, z: f32) -> f32 {
        if x.abs() > SPAWN_AREA_RADIUS || z.abs() > SPAWN_AREA_RADIUS {
            return ground_height(x, z);
        }

        let gx = ((x + SPAWN_AREA_RADIUS) / Self::CELL_SIZE).clamp(0.0, (HEIGHTMAP_SIZE - 1) as f32);
        let gz = ((z + SPAWN_AREA_RADIUS) / Self::CELL_SIZE).clamp(0.0, (HEIGHTMAP_SIZE - 1) as f32);
        let (c0, r0) = (gx.floor() as usize, gz.floor() as usize);
        let (c1, r1) = ((c0 + 1).min(HEIGHTMAP_SIZE - 1), (r0 + 1).min(HEIGHTMAP_SIZE - 1));
        let (fx, fz) = (gx - c0 as f32, gz - r0 as f32);

        let top = self.at(c0, r0) + (self.at(c1, r0) - self.at(c0, r0)) * fx;
        let bottom = self.at(c0, r1) + (self.at(c1, r1) - self.at(c0, r1)) * fx;
        top + (bottom - top) * fz
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_reports_completion() {
        let progress = BootstrapProgress::default();
        assert_eq!(progress.percent(), 0);
        let map = SpawnHeightmap::generate(&progress);
        assert!(progress.is_complete());
        assert_eq!(progress.percent(), 100);
        assert_eq!(map.heights().len(), HEIGHTMAP_SIZE * HEIGHTMAP_SIZE);
    }

    #[test]
    fn test_grid_points_match_slow_path() {
        let map = SpawnHeightmap::generate(&BootstrapProgress::default());
        let x = -SPAWN_AREA_RADIUS + 10.0 * SpawnHeightmap::CELL_SIZE;
        let z = -SPAWN_AREA_RADIUS + 20.0 * SpawnHeightmap::CELL_SIZE;
        assert!((map.height(x, z) - ground_height(x, z)).abs() < 1e-4);
    }

    #[test]
    fn test_outside_area_uses_slow_path() {
        let map = SpawnHeightmap::generate(&BootstrapProgress::default());
        assert_eq!(map.height(100.0, -50.0), ground_height(100.0, -50.0));
    }

    #[test]
    fn test_area_edges_are_sampled() {
        let map = SpawnHeightmap::generate(&BootstrapProgress::default());
        let r = SPAWN_AREA_RADIUS;
        let inner = -r + 10.0 * SpawnHeightmap::CELL_SIZE;
        for (x, z) in [(r, r), (-r, r), (r, -r), (r, inner), (inner, r)] {
            let expected = ground_height(x, z);
            assert!((map.height(x, z) - expected).abs() < 1e-3, "({x}, {z})");
        }
        let last = HEIGHTMAP_SIZE - 1;
        assert!((map.heights()[last * HEIGHTMAP_SIZE + last] - ground_height(r, r)).abs() < 1e-3);
    }

    #[test]
    fn test_interpolation_between_cells() {
        let map = SpawnHeightmap::generate(&BootstrapProgress::default());
        let x0 = -SPAWN_AREA_RADIUS + 5.0 * SpawnHeightmap::CELL_SIZE;
        let x1 = x0 + SpawnHeightmap::CELL_SIZE;
        let z = -SPAWN_AREA_RADIUS + 5.0 * SpawnHeightmap::CELL_SIZE;
        let mid = map.height((x0 + x1) * 0.5, z);
        let expected = (map.height(x0, z) + map.height(x1, z)) * 0.5;
        assert!((mid - expected).abs() < 1e-4);
    }

    #[test]
    fn test_background_spawn() {
        let (progress, handle) = SpawnHeightmap::spawn();
        let map = handle.join().unwrap();
        assert!(progress.is_complete());
        assert_eq!(map.heights().len(), HEIGHTMAP_SIZE * HEIGHTMAP_SIZE);
    }
}
