//! CPU particle physics for audio-reactive effect emitters.
//!
//! Layout matches the GPU particle buffers: one `[x, y, z, life]` record and
//! one `[vx, vy, vz, speed]` record per particle, so both arrays upload
//! without repacking.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rayon::prelude::*;

use super::rng::XorShift32;

/// Particle counts above this update in parallel
pub const PARTICLE_PARALLEL_THRESHOLD: usize = 2048;

/// Life lost per second (a particle lives ~3.3 s)
pub const LIFE_DECAY_PER_SEC: f32 = 0.3;

/// Radius of the respawn ring around the emitter
pub const RESPAWN_SPREAD: f32 = 10.0;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticlePosition {
    pub position: [f32; 3],
    pub life: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleVelocity {
    pub velocity: [f32; 3],
    pub speed: f32,
}

/// Per-step forces and emitter placement
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleStep {
    pub dt: f32,
    /// Acceleration along Y (negative pulls down)
    pub gravity_y: f32,
    /// Audio intensity 0..1; speeds particles up to 3x
    pub audio_pulse: f32,
    pub spawn: Vec3,
}

impl Default for ParticleStep {
    fn default() -> Self {
        Self { dt: 1.0 / 60.0, gravity_y: -9.8, audio_pulse: 0.0, spawn: Vec3::ZERO }
    }
}

/// Fixed-size particle set with respawn-on-death
pub struct ParticleBuffer {
    positions: Vec<ParticlePosition>,
    velocities: Vec<ParticleVelocity>,
    /// Accumulated simulation time, varies respawn placement
    elapsed: f32,
}

impl ParticleBuffer {
    /// Scatter `count` particles around `spawn` with random life and velocity
    pub fn new(count: usize, spawn: Vec3, seed: u32) -> Self {
        let mut rng = XorShift32::new(seed);
        let mut positions = Vec::with_capacity(count);
        let mut velocities = Vec::with_capacity(count);
        for _ in 0..count {
            positions.push(ParticlePosition {
                position: [
                    spawn.x + rng.range(-RESPAWN_SPREAD, RESPAWN_SPREAD),
                    spawn.y,
                    spawn.z + rng.range(-RESPAWN_SPREAD, RESPAWN_SPREAD),
                ],
                // staggered so they do not all respawn on the same frame
                life: rng.next_f32(),
            });
            velocities.push(ParticleVelocity {
                velocity: [rng.range(-2.0, 2.0), rng.range(3.0, 7.0), rng.range(-2.0, 2.0)],
                speed: 1.0,
            });
        }
        Self { positions, velocities, elapsed: 0.0 }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[ParticlePosition] {
        &self.positions
    }

    pub fn velocities(&self) -> &[ParticleVelocity] {
        &self.velocities
    }

    pub fn positions_mut(&mut self) -> &mut [ParticlePosition] {
        &mut self.positions
    }

    pub fn velocities_mut(&mut self) -> &mut [ParticleVelocity] {
        &mut self.velocities
    }

    /// Integrate one step. `dt` is clamped to 0.1 s.
    pub fn update(&mut self, step: ParticleStep) {
        let dt = step.dt.clamp(0.0, 0.1);
        self.elapsed += dt;

        let elapsed = self.elapsed;
        let gravity_dt = step.gravity_y * dt;
        let boost = 1.0 + step.audio_pulse * 2.0;
        let decay = LIFE_DECAY_PER_SEC * dt;
        let spawn = step.spawn;

        let integrate = |(i, (p, v)): (usize, (&mut ParticlePosition, &mut ParticleVelocity))| {
            v.velocity[1] += gravity_dt;
            let speed = v.speed * boost;
            for axis in 0..3 {
                p.position[axis] += v.velocity[axis] * dt * speed;
            }
            p.life -= decay;

            if p.life < 0.0 {
                // index and time both feed the seed so successive respawns differ
                let seed = i as f32 * 0.123 + elapsed * 0.1;
                p.life = 1.0;
                p.position = [
                    spawn.x + (seed * 12.9898).sin() * RESPAWN_SPREAD,
                    spawn.y,
                    spawn.z + (seed * 78.233).cos() * RESPAWN_SPREAD,
                ];
                let vel_seed = seed + i as f32 * 0.456;
                v.velocity = [
                    vel_seed.sin() * 2.0,
                    5.0 + vel_seed.cos() * 2.0,
                    (vel_seed * 1.5).cos() * 2.0,
                ];
                v.speed = 1.0;
            }
        };

        if self.positions.len() > PARTICLE_PARALLEL_THRESHOLD {
            self.positions
                .par_iter_mut()
                .zip(self.velocities.par_iter_mut())
                .enumerate()
                .for_each(integrate);
        } else {
            self.positions
                .iter_mut()
                .zip(self.velocities.iter_mut())
                .enumerate()
                .for_each(integrate);
        }
    }

    /// True if any live particle is within `radius` of `point`
    pub fn collides(&self, point: Vec3, radius: f32) -> bool {
        let r_sq = radius * radius;
        self.positions
            .iter()
            .filter(|p| p.life > 0.0)
            .any(|p| Vec3::from_array(p.position).distance_squared(point) < r_sq)
    }

    /// Number of particles with life left
    pub fn alive(&self) -> usize {
        self.positions.iter().filter(|p| p.life > 0.0).count()
    }
}
