//! GPU upload of flora batches and effects

pub mod context;
pub mod instance_buffer;

pub use context::GpuContext;
pub use instance_buffer::{BatchBuffers, DrawBatch, EffectBuffers, FloraGpu, InstanceBuffer, MeshBuffers};
