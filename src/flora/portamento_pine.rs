//! Portamento pine batcher: trees lean towards the stereo position of
//! their channel, snapping faster while a pitch slide is running.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::config::PortamentoPineConfig;
use super::{Batcher, FoliageKind, FoliageObject, InstanceBase, SpawnOptions};
use crate::audio::{ActiveEffect, AudioFrame};
use crate::geometry::{generate_cone, generate_cylinder, MeshData, SoftMesh};
use crate::kernels::deform::DeformKind;
use crate::kernels::smooth_damp;
use crate::pool::{DenseInstancePool, FoliageId};

/// Portamento pine instance (64 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PortamentoPineInstance {
    pub base: InstanceBase,
    /// Lean around Z, radians; positive leans right
    pub bend: f32,
    pub bend_velocity: f32,
    /// 1 while the channel slides
    pub sliding: f32,
    pub _pad: f32,
}

pub struct PortamentoPineBatcher {
    config: PortamentoPineConfig,
    geometry: SoftMesh,
    pool: DenseInstancePool<PortamentoPineInstance>,
}

impl PortamentoPineBatcher {
    pub fn new(config: PortamentoPineConfig) -> Self {
        let trunk = generate_cylinder(0.15, 0.1, 1.0, 6).with_color([0.4, 0.27, 0.15, 1.0]);
        let needles = [0.8, 1.5, 2.1]
            .iter()
            .zip([1.0, 0.8, 0.55])
            .map(|(&y, radius)| {
                generate_cone(radius, 1.2, 8)
                    .with_color([0.12, 0.45, 0.3, 1.0])
                    .transformed(Mat4::from_translation(Vec3::new(0.0, y, 0.0)))
            })
            .collect::<Vec<_>>();
        let geometry = MeshData::merge(std::iter::once(&trunk).chain(needles.iter()));
        log::info!(
            "Portamento pine batcher: {} vertices, capacity {}",
            geometry.vertex_count(),
            config.capacity
        );

        Self {
            pool: DenseInstancePool::new("portamento_pine", config.capacity),
            geometry: SoftMesh::new(geometry, DeformKind::Wobble, 1.0),
            config,
        }
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self::new(PortamentoPineConfig { capacity, ..Default::default() })
    }
}

impl Batcher for PortamentoPineBatcher {
    type Instance = PortamentoPineInstance;

    fn kind(&self) -> FoliageKind {
        FoliageKind::PortamentoPine
    }

    fn geometry(&self) -> &MeshData {
        self.geometry.mesh()
    }

    fn soft_mesh_mut(&mut self) -> Option<&mut SoftMesh> {
        Some(&mut self.geometry)
    }

    fn pool(&self) -> &DenseInstancePool<PortamentoPineInstance> {
        &self.pool
    }

    fn pool_mut(&mut self) -> &mut DenseInstancePool<PortamentoPineInstance> {
        &mut self.pool
    }

    fn register(&mut self, id: FoliageId, object: &FoliageObject, _options: &SpawnOptions) -> Option<u32> {
        let instance = PortamentoPineInstance {
            base: InstanceBase::from_object(object),
            ..Default::default()
        };
        self.pool.register(id, instance)
    }

    fn update(&mut self, slot: u32, object: &FoliageObject) {
        self.pool.modify(slot, |inst| inst.base = InstanceBase::from_object(object));
    }

    fn update_audio(&mut self, audio: &AudioFrame, _time: f32, dt: f32) {
        let config = &self.config;

        self.pool.for_each_mut(|_, inst| {
            let ch = audio.channel(inst.base.channel_index());
            let sliding = ch.active_effect == ActiveEffect::Portamento;
            let smooth_time = if sliding { config.slide_smooth_time } else { config.smooth_time };
            // silent channels let the tree stand back up
            let target = ch.pan.clamp(-1.0, 1.0) * config.max_bend * ch.volume.clamp(0.0, 1.0).sqrt();

            inst.bend = smooth_damp(inst.bend, target, &mut inst.bend_velocity, smooth_time, dt);
            inst.sliding = if sliding { 1.0 } else { 0.0 };
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ChannelData;

    fn panned(pan: f32, effect: ActiveEffect) -> AudioFrame {
        AudioFrame {
            channels: vec![ChannelData { volume: 1.0, pan, active_effect: effect, ..Default::default() }],
            ..Default::default()
        }
    }

    fn pine() -> PortamentoPineBatcher {
        let mut batcher = PortamentoPineBatcher::with_capacity(1);
        let obj = FoliageObject::new(FoliageKind::PortamentoPine, Vec3::ZERO).with_channel(0);
        batcher.register(FoliageId(1), &obj, &SpawnOptions::default());
        batcher
    }

    fn bend_after(frames: usize, frame: &AudioFrame) -> f32 {
        let mut batcher = pine();
        for _ in 0..frames {
            batcher.update_audio(frame, 0.0, 1.0 / 60.0);
        }
        batcher.pool().get(0).unwrap().bend
    }

    #[test]
    fn test_instance_size() {
        assert_eq!(std::mem::size_of::<PortamentoPineInstance>(), 64);
    }

    #[test]
    fn test_leans_towards_pan() {
        let max = PortamentoPineConfig::default().max_bend;
        let right = bend_after(240, &panned(1.0, ActiveEffect::None));
        let left = bend_after(240, &panned(-1.0, ActiveEffect::None));
        assert!((right - max).abs() < 0.01);
        assert!((left + max).abs() < 0.01);
    }

    #[test]
    fn test_portamento_responds_faster() {
        let slow = bend_after(6, &panned(1.0, ActiveEffect::None));
        let fast = bend_after(6, &panned(1.0, ActiveEffect::Portamento));
        assert!(fast > slow);
    }

    #[test]
    fn test_silence_stands_up() {
        let mut batcher = pine();
        for _ in 0..120 {
            batcher.update_audio(&panned(1.0, ActiveEffect::None), 0.0, 1.0 / 60.0);
        }
        for _ in 0..300 {
            batcher.update_audio(&AudioFrame::silent(), 0.0, 1.0 / 60.0);
        }
        assert!(batcher.pool().get(0).unwrap().bend.abs() < 0.01);
    }
}
