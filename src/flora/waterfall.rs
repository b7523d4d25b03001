//! Waterfall batcher: flow scroll surging on each beat, foam on the kick.

use bytemuck::{Pod, Zeroable};

use super::config::WaterfallConfig;
use super::{Batcher, FoliageKind, FoliageObject, InstanceBase, SpawnOptions};
use crate::audio::{decay, AudioFrame};
use crate::geometry::{generate_sheet, MeshData, SoftMesh};
use crate::kernels::deform::DeformKind;
use crate::pool::{DenseInstancePool, FoliageId};

/// Waterfall instance (64 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct WaterfallInstance {
    pub base: InstanceBase,
    /// Texture scroll, wrapped to 0..1
    pub flow_offset: f32,
    /// Scroll speed this frame
    pub flow_speed: f32,
    pub foam: f32,
    /// Per-instance speed multiplier from spawn options
    pub speed: f32,
}

pub struct WaterfallBatcher {
    config: WaterfallConfig,
    geometry: SoftMesh,
    pool: DenseInstancePool<WaterfallInstance>,
}

impl WaterfallBatcher {
    pub fn new(config: WaterfallConfig) -> Self {
        let geometry = generate_sheet(2.0, 6.0, 2, 12).with_color([0.55, 0.8, 1.0, 0.85]);
        log::info!("Waterfall batcher: capacity {}", config.capacity);

        Self {
            pool: DenseInstancePool::new("waterfall", config.capacity),
            geometry: SoftMesh::new(geometry, DeformKind::Jiggle, 0.5).with_rebuilt_normals(),
            config,
        }
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self::new(WaterfallConfig { capacity, ..Default::default() })
    }

    /// Scroll speed at a point in the beat: fastest on the downbeat
    pub fn flow_speed(&self, beat_phase: f32) -> f32 {
        let surge = (1.0 - beat_phase.clamp(0.0, 1.0)).powi(2);
        self.config.flow_speed * (1.0 + self.config.beat_surge * surge)
    }
}

impl Batcher for WaterfallBatcher {
    type Instance = WaterfallInstance;

    fn kind(&self) -> FoliageKind {
        FoliageKind::Waterfall
    }

    fn geometry(&self) -> &MeshData {
        self.geometry.mesh()
    }

    fn soft_mesh_mut(&mut self) -> Option<&mut SoftMesh> {
        Some(&mut self.geometry)
    }

    fn pool(&self) -> &DenseInstancePool<WaterfallInstance> {
        &self.pool
    }

    fn pool_mut(&mut self) -> &mut DenseInstancePool<WaterfallInstance> {
        &mut self.pool
    }

    fn register(&mut self, id: FoliageId, object: &FoliageObject, options: &SpawnOptions) -> Option<u32> {
        let instance = WaterfallInstance {
            base: InstanceBase::from_object(object),
            speed: options.speed,
            ..Default::default()
        };
        self.pool.register(id, instance)
    }

    fn update(&mut self, slot: u32, object: &FoliageObject) {
        self.pool.modify(slot, |inst| inst.base = InstanceBase::from_object(object));
    }

    fn update_audio(&mut self, audio: &AudioFrame, _time: f32, dt: f32) {
        let speed = self.flow_speed(audio.beat_phase);
        let kick = audio.kick_trigger.clamp(0.0, 1.0);
        let release = self.config.foam_release;
        let dt = dt.max(0.0);

        self.pool.for_each_mut(|_, inst| {
            inst.flow_speed = speed * inst.speed;
            inst.flow_offset = (inst.flow_offset + inst.flow_speed * dt).fract();
            inst.foam = decay(inst.foam, release, dt).max(kick);
        });
    }
}
