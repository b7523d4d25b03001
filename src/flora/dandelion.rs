//! Dandelion batcher: seed heads blow apart on the kick and regrow.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::config::DandelionConfig;
use super::{Batcher, FoliageKind, FoliageObject, InstanceBase, SpawnOptions};
use crate::audio::{AudioFrame, TriggerEdge};
use crate::geometry::{generate_cylinder, generate_sphere, MeshData};
use crate::pool::{DenseInstancePool, FoliageId};

/// Dandelion instance (64 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DandelionInstance {
    pub base: InstanceBase,
    /// Seed spread: 1 right after a burst, back to 0 when fully regrown
    pub spread: f32,
    /// Stem sway angle, radians
    pub sway: f32,
    /// Bursts so far; feeds seed scatter randomness in the shader
    pub bursts: f32,
    pub _pad: f32,
}

pub struct DandelionBatcher {
    config: DandelionConfig,
    geometry: MeshData,
    pool: DenseInstancePool<DandelionInstance>,
    kick: TriggerEdge,
}

impl DandelionBatcher {
    pub fn new(config: DandelionConfig) -> Self {
        let stem = generate_cylinder(0.02, 0.015, 0.5, 5).with_color([0.35, 0.6, 0.25, 1.0]);
        let head = generate_sphere(0.12, 8, 6)
            .with_color([0.97, 0.97, 0.92, 1.0])
            .transformed(Mat4::from_translation(Vec3::new(0.0, 0.55, 0.0)));
        let geometry = MeshData::merge([&stem, &head]);
        log::info!(
            "Dandelion batcher: {} vertices, capacity {}",
            geometry.vertex_count(),
            config.capacity
        );

        Self {
            pool: DenseInstancePool::new("dandelion", config.capacity),
            geometry,
            kick: TriggerEdge::default(),
            config,
        }
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self::new(DandelionConfig { capacity, ..Default::default() })
    }
}

impl Batcher for DandelionBatcher {
    type Instance = DandelionInstance;

    fn kind(&self) -> FoliageKind {
        FoliageKind::Dandelion
    }

    fn geometry(&self) -> &MeshData {
        &self.geometry
    }

    fn pool(&self) -> &DenseInstancePool<DandelionInstance> {
        &self.pool
    }

    fn pool_mut(&mut self) -> &mut DenseInstancePool<DandelionInstance> {
        &mut self.pool
    }

    fn register(&mut self, id: FoliageId, object: &FoliageObject, _options: &SpawnOptions) -> Option<u32> {
        let instance = DandelionInstance {
            base: InstanceBase::from_object(object),
            ..Default::default()
        };
        self.pool.register(id, instance)
    }

    fn update(&mut self, slot: u32, object: &FoliageObject) {
        self.pool.modify(slot, |inst| inst.base = InstanceBase::from_object(object));
    }

    fn update_audio(&mut self, audio: &AudioFrame, time: f32, dt: f32) {
        let burst = self.kick.rising(audio.kick_trigger, self.config.kick_threshold);
        let regrow = if self.config.regrow_seconds > 0.0 {
            dt.max(0.0) / self.config.regrow_seconds
        } else {
            1.0
        };
        let amplitude = self.config.sway * (1.0 + audio.groove_amount * 4.0);

        self.pool.for_each_mut(|_, inst| {
            // only heads that have mostly regrown can burst again
            if burst && inst.spread < 0.2 {
                inst.spread = 1.0;
                inst.bursts += 1.0;
            } else {
                inst.spread = (inst.spread - regrow).max(0.0);
            }
            inst.sway = (time * 1.5 + inst.base.phase).sin() * amplitude;
        });
    }
}
