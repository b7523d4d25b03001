//! Tunegrove - music-reactive procedural flora

pub mod core;
pub mod pool;
pub mod audio;
pub mod kernels;
pub mod geometry;
pub mod flora;
pub mod render;
