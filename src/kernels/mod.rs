//! Numeric helper kernels.
//!
//! Pure functions over plain numeric slices: interpolation and noise, batch
//! distance/culling, music-driven animation kernels, vertex deformation,
//! particle and fluid simulation, and the spawn heightmap. The flora layer
//! calls these with packed arrays and reads plain results back; nothing in
//! here knows about batchers or the world.

pub mod math;
pub mod batch;
pub mod animation;
pub mod deform;
pub mod rng;
pub mod particles;
pub mod fluid;
pub mod bootstrap;

pub use animation::{AnimationEntry, AnimationOutput, BatchParams, BatchedAnimation, arpeggio_step, process_batch};
pub use bootstrap::{BootstrapProgress, SpawnHeightmap};
pub use fluid::FluidGrid;
pub use math::{fbm, lerp, smooth_damp, smoothstep, value_noise_2d};
pub use particles::{ParticleBuffer, ParticleStep};
pub use rng::XorShift32;
