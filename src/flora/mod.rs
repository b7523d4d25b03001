//! Music-reactive flora.
//!
//! Every batchable [`FoliageKind`] has its own batcher: a static mesh merged
//! once plus a [`DenseInstancePool`] of per-instance records. Batchers never
//! talk to each other; [`FloraWorld`] owns them all and drives them in a
//! fixed order each frame.
//!
//! Instance records carry both what the shader reads and the small amount
//! of reactive state (envelopes, timers) the batcher needs between frames,
//! so swap-removal moves the state along with the instance.

pub mod object;
pub mod config;
pub mod animate;
pub mod world;

pub mod mushroom;
pub mod dandelion;
pub mod cloud;
pub mod waterfall;
pub mod glowing_flower;
pub mod simple_flower;
pub mod arpeggio_fern;
pub mod portamento_pine;

use bytemuck::{Pod, Zeroable};

use crate::audio::AudioFrame;
use crate::geometry::{MeshData, SoftMesh};
use crate::pool::{DenseInstancePool, FoliageId};

pub use animate::AnimationDriver;
pub use arpeggio_fern::{ArpeggioFernBatcher, ArpeggioFernInstance};
pub use cloud::{CloudBatcher, CloudInstance};
pub use config::FloraConfig;
pub use dandelion::{DandelionBatcher, DandelionInstance};
pub use glowing_flower::{GlowingFlowerBatcher, GlowingFlowerInstance};
pub use mushroom::{MushroomBatcher, MushroomInstance};
pub use object::{AnimationKind, FoliageKind, FoliageObject, Pose};
pub use portamento_pine::{PortamentoPineBatcher, PortamentoPineInstance};
pub use simple_flower::{SimpleFlowerBatcher, SimpleFlowerInstance};
pub use waterfall::{WaterfallBatcher, WaterfallInstance};
pub use world::{FloraStats, FloraWorld};

/// Per-instance transform shared by every batcher (48 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceBase {
    pub position: [f32; 3],
    pub phase: f32,
    /// Quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    /// Playback channel; objects without a binding follow channel 0
    pub channel: u32,
}

impl InstanceBase {
    pub fn from_object(object: &FoliageObject) -> Self {
        Self {
            position: object.position.to_array(),
            phase: object.phase,
            rotation: object.rotation.to_array(),
            scale: object.scale.to_array(),
            channel: object.channel.unwrap_or(0) as u32,
        }
    }

    pub fn channel_index(&self) -> usize {
        self.channel as usize
    }
}

/// Per-spawn overrides passed to a batcher
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnOptions {
    /// Base colour; otherwise taken from the object's note or the batcher default
    pub tint: Option<[f32; 3]>,
    /// Multiplies the batcher's animation speed (drift, flow)
    pub speed: f32,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self { tint: None, speed: 1.0 }
    }
}

/// Common interface of the instance batchers
pub trait Batcher {
    type Instance: Pod;

    fn kind(&self) -> FoliageKind;

    /// Merged static mesh, drawn once per live instance
    fn geometry(&self) -> &MeshData;

    fn pool(&self) -> &DenseInstancePool<Self::Instance>;

    fn pool_mut(&mut self) -> &mut DenseInstancePool<Self::Instance>;

    /// Add an instance for `object`; `None` when the batch is full
    fn register(&mut self, id: FoliageId, object: &FoliageObject, options: &SpawnOptions) -> Option<u32>;

    /// Rewrite the transform and bindings of a slot, keeping reactive state
    fn update(&mut self, slot: u32, object: &FoliageObject);

    /// Per-frame audio reaction
    fn update_audio(&mut self, audio: &AudioFrame, time: f32, dt: f32);

    /// Shared mesh bent every frame, for batches that have one
    fn soft_mesh_mut(&mut self) -> Option<&mut SoftMesh> {
        None
    }

    fn remove(&mut self, id: FoliageId) -> bool {
        self.pool_mut().remove(id)
    }

    fn update_by_id(&mut self, id: FoliageId, object: &FoliageObject) -> bool {
        match self.pool().slot_of(id) {
            Some(slot) => {
                self.update(slot, object);
                true
            }
            None => false,
        }
    }
}

/// Base colour for a new instance
pub(crate) fn base_color(
    object: &FoliageObject,
    options: &SpawnOptions,
    palette: &crate::audio::NotePalette,
    fallback: [f32; 3],
) -> [f32; 3] {
    options
        .tint
        .or_else(|| object.note.map(|n| palette.color(n as f32)))
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_instance_base_size() {
        assert_eq!(std::mem::size_of::<InstanceBase>(), 48);
    }

    #[test]
    fn test_instance_base_from_object() {
        let obj = FoliageObject::new(FoliageKind::Mushroom, Vec3::new(1.0, 2.0, 3.0))
            .with_phase(0.5)
            .with_channel(4);
        let base = InstanceBase::from_object(&obj);
        assert_eq!(base.position, [1.0, 2.0, 3.0]);
        assert_eq!(base.phase, 0.5);
        assert_eq!(base.channel_index(), 4);
        assert_eq!(base.rotation, [0.0, 0.0, 0.0, 1.0]);

        let unbound = InstanceBase::from_object(&FoliageObject::new(FoliageKind::Cloud, Vec3::ZERO));
        assert_eq!(unbound.channel, 0);
    }

    #[test]
    fn test_base_color_precedence() {
        let palette = crate::audio::NotePalette::default();
        let obj = FoliageObject::new(FoliageKind::Mushroom, Vec3::ZERO);
        let fallback = [0.1, 0.2, 0.3];
        assert_eq!(base_color(&obj, &SpawnOptions::default(), &palette, fallback), fallback);

        let noted = obj.clone().with_note(62);
        assert_eq!(base_color(&noted, &SpawnOptions::default(), &palette, fallback), palette.color(62.0));

        let tinted = SpawnOptions { tint: Some([1.0, 0.0, 0.0]), ..Default::default() };
        assert_eq!(base_color(&noted, &tinted, &palette, fallback), [1.0, 0.0, 0.0]);
    }
}
